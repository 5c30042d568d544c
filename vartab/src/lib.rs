#[cfg(feature = "core")]
#[doc(inline)]
pub use vartab_core as core;

#[cfg(feature = "tabix")]
#[doc(inline)]
pub use vartab_tabix as tabix;

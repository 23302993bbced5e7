//! Static data tables.
//!
//! - [`fragment`] - the append-only fragment list every encoder produces
//! - [`image`] - flat byte + relocation images handed to the object writer

pub mod fragment;
pub mod image;

pub use fragment::{DataFragment, FragmentList, Symbol};
pub use image::{DataImage, Relocation};

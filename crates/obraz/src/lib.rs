#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use obraz_image as image;

#[doc(inline)]
pub use obraz_imgproc as imgproc;

pub(crate) mod bitmap;
pub(crate) mod color_cache;
pub(crate) mod quantizer;

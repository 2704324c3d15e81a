pub mod colormap;
pub mod frame;

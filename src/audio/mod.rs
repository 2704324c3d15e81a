pub mod adapter;
pub mod decode;
pub mod pcm;
pub mod source;

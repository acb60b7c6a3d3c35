pub mod keycode;
pub mod value;

/// Define a codec type and implement the Codec trait, mirroring the shape the teacher
/// used for its text/binary codecs.
pub trait Codec {
    fn codec_name(&self) -> &'static str;
}

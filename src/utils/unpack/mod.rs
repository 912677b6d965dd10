pub mod packerjs;

pub use packerjs::{detect, packed_scripts, unpack, unpack_and_combine, PackedScript};

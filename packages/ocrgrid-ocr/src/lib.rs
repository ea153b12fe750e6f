pub mod engine;
pub mod paddle;
pub mod protocol;
pub mod region;

pub use engine::{OcrEngine, OcrError, OcrInput, OcrOutput};
pub use paddle::{ArgValue, EngineArgs, ProcessEngine, SocketEngine};
pub use protocol::{OcrRequest, OcrResponse, CODE_NO_TEXT, CODE_OK};
pub use region::{Point, Quad, TextRegion};

pub mod amount;
pub mod codec;
pub mod event;
pub mod hash;
pub mod link;
pub mod order;
pub mod request;
pub mod state;

pub use amount::*;
pub use event::*;
pub use hash::*;
pub use link::*;
pub use order::*;
pub use request::*;
pub use state::*;

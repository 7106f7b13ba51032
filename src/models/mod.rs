pub mod cart;
pub mod layout;
pub mod queue;
pub mod seat;
pub mod session;

pub use cart::{Cart, CartStatus};
pub use layout::{AuditoriumLayout, RowLayout, SeatType};
pub use queue::{QueueEntry, QueueStatus};
pub use seat::{NewSeat, Seat, SeatStatus};
pub use session::SessionRecord;

//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層を操作します。

pub mod broadcaster;
pub mod connect_participant;
pub mod disconnect_participant;
pub mod error;
pub mod membership;
pub mod send_message;

pub use broadcaster::{DeliveryReport, RoomBroadcaster, RoomFanout};
pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, SendMessageError};
pub use membership::MembershipGuard;
pub use send_message::SendMessageUseCase;

//! UseCase: 参加者接続処理（ルームへの join）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - ルーム名の検証、表示名の解決、レジストリ登録、チャンネル購読
//!
//! ### なぜこのテストが必要か
//! - 不正なルーム名・身元不明の接続が一切登録されないことを保証
//! - 購読に失敗した場合に登録がロールバックされることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規接続の join と購読
//! - 異常系：不正なルーム名、身元解決の失敗、購読失敗

use std::sync::Arc;

use hiroba_shared::time::get_jst_timestamp;

use crate::domain::{
    Connection, ConnectionIdFactory, ConnectionRegistry, IdentityResolver, Outbox, RoomId,
    Timestamp,
};

use super::{broadcaster::RoomBroadcaster, error::ConnectError};

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    broadcaster: Arc<RoomBroadcaster>,
    identity: Arc<dyn IdentityResolver>,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        broadcaster: Arc<RoomBroadcaster>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            identity,
        }
    }

    /// 参加者接続を実行
    ///
    /// # Arguments
    ///
    /// * `room_name` - ルート パラメータから取り出したルーム名
    /// * `claimed_identity` - 接続が持ってきた身元情報
    /// * `outbox` - この接続の送信キュー
    ///
    /// # Returns
    ///
    /// * `Ok(Connection)` - 接続成功（レジストリ登録済み・チャンネル購読済み）
    /// * `Err(ConnectError)` - 接続失敗（状態は一切変更されない）
    pub async fn execute(
        &self,
        room_name: String,
        claimed_identity: Option<String>,
        outbox: Outbox,
    ) -> Result<Connection, ConnectError> {
        // 1. ルーム名の検証
        let room_id =
            RoomId::new(room_name).map_err(|e| ConnectError::InvalidArgument(e.to_string()))?;

        // 2. 表示名の解決（接続中に一度だけ）
        let display_name = self
            .identity
            .resolve(claimed_identity)
            .await
            .map_err(|e| ConnectError::IdentityResolutionFailed(e.to_string()))?;

        // 3. レジストリに登録
        let connection = Connection::new(
            ConnectionIdFactory::generate(),
            display_name,
            room_id.clone(),
            Timestamp::new(get_jst_timestamp()),
        );
        self.registry
            .join(&room_id, connection.member(outbox))
            .map_err(|e| ConnectError::InvalidArgument(e.to_string()))?;

        // 4. チャンネル購読（失敗したら登録を取り消す）
        if let Err(e) = self.broadcaster.ensure_subscribed(&room_id).await {
            self.registry.leave(&connection.id, &room_id);
            return Err(ConnectError::SubscribeFailed(e.to_string()));
        }

        tracing::info!(
            "Connection '{}' ({}) joined room '{}'",
            connection.id,
            connection.display_name,
            room_id
        );
        Ok(connection)
    }
}

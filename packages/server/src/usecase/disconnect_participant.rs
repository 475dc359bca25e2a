//! UseCase: 参加者切断処理（ルームからの leave）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - レジストリからの削除と、ローカルメンバーがいなくなったルームの購読解除
//!
//! ### なぜこのテストが必要か
//! - 切断後の接続にメッセージを配信しないことを保証
//! - 最後のメンバーが抜けたルームの購読が解放されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：メンバーが残るルームからの切断
//! - エッジケース：最後のメンバーの切断、二重の切断

use std::sync::Arc;

use crate::domain::{Connection, ConnectionRegistry, RoomId};

use super::broadcaster::RoomBroadcaster;

/// 参加者切断のユースケース
#[derive(Clone)]
pub struct DisconnectParticipantUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    broadcaster: Arc<RoomBroadcaster>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(registry: Arc<dyn ConnectionRegistry>, broadcaster: Arc<RoomBroadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// 参加者切断を実行
    ///
    /// # Returns
    ///
    /// ルームのローカルメンバーが 0 人になった場合は `true`
    pub async fn execute(&self, connection: &Connection) -> bool {
        let emptied = self.leave(connection);
        if emptied {
            self.release_channel(&connection.room_id).await;
        }
        emptied
    }

    /// レジストリからの削除のみを同期的に行う
    ///
    /// `Drop` からも呼ばれるため await を含まない。
    pub fn leave(&self, connection: &Connection) -> bool {
        let emptied = self.registry.leave(&connection.id, &connection.room_id);
        tracing::info!(
            "Connection '{}' ({}) left room '{}'",
            connection.id,
            connection.display_name,
            connection.room_id
        );
        emptied
    }

    /// ローカルメンバーがいなければルームの購読を解除する
    ///
    /// 購読解除の失敗はログに残すのみ（配信の正しさには影響しない）。
    pub async fn release_channel(&self, room_id: &RoomId) {
        if let Err(e) = self.broadcaster.release_if_unused(room_id).await {
            tracing::warn!("Failed to release channel for room '{}': {}", room_id, e);
        }
    }
}

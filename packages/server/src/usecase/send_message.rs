//! UseCase: メッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() メソッド
//! - 受信ペイロードの検証、エンベロープの構築、ルームチャンネルへの publish
//!
//! ### なぜこのテストが必要か
//! - 不正な形式のメッセージが誰にも配信されないことを保証
//! - 送信者自身を含むルーム全員に共有チャンネル経由で届くことを確認
//! - ブローカー障害が DeliveryFailed として呼び出し元に返ることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージ送信と自分自身へのエコー
//! - 異常系：フィールド名の誤り、JSON でない入力、ブローカー停止

use std::sync::Arc;

use crate::{
    domain::{Connection, MessageContent, MessageEnvelope},
    infrastructure::dto::websocket::InboundChatMessage,
};

use super::{broadcaster::RoomBroadcaster, error::SendMessageError};

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    broadcaster: Arc<RoomBroadcaster>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(broadcaster: Arc<RoomBroadcaster>) -> Self {
        Self { broadcaster }
    }

    /// 受信したテキストフレームを `{"message": "<text>"}` として解釈する
    pub fn parse(raw: &str) -> Result<MessageContent, SendMessageError> {
        let inbound = serde_json::from_str::<InboundChatMessage>(raw)
            .map_err(|e| SendMessageError::MalformedMessage(e.to_string()))?;
        MessageContent::new(inbound.message)
            .map_err(|e| SendMessageError::MalformedMessage(e.to_string()))
    }

    /// メッセージ送信を実行
    ///
    /// 配信の完了は待たない。送信者自身への配信も購読経由で行われる。
    ///
    /// # Arguments
    ///
    /// * `sender` - 送信元の接続（join 済み）
    /// * `raw` - 受信したテキストフレーム
    ///
    /// # Returns
    ///
    /// * `Ok(MessageEnvelope)` - publish したエンベロープ
    /// * `Err(SendMessageError)` - 形式不正、または publish 失敗
    pub async fn execute(
        &self,
        sender: &Connection,
        raw: &str,
    ) -> Result<MessageEnvelope, SendMessageError> {
        let content = Self::parse(raw)?;
        let envelope = MessageEnvelope::chat_message(
            sender.room_id.clone(),
            content,
            sender.display_name.clone(),
        );

        self.broadcaster
            .publish(envelope.clone())
            .await
            .map_err(|e| SendMessageError::DeliveryFailed(e.to_string()))?;

        tracing::debug!(
            "Published message from '{}' to room '{}'",
            sender.display_name,
            sender.room_id
        );
        Ok(envelope)
    }
}

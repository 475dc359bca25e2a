//! InMemory Connection Registry 実装
//!
//! ドメイン層が定義する ConnectionRegistry trait の具体的な実装。
//! ルームごとのメンバー表を `DashMap` に保持します。
//!
//! ## ロック順序
//!
//! `join` だけが 2 つのマップを同時にロックします（`index` → `rooms` の順）。
//! 他の操作は一度に 1 つのシャードしかロックしないため、デッドロックは起きません。
//! ルーム同士は独立しており、グローバルロックはありません。

use std::collections::{HashMap, HashSet};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::domain::{
    ConnectionId, ConnectionRegistry, Member, Outbox, RegistryError, RoomId,
};

/// インメモリ Connection Registry 実装
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    /// ルーム名 → そのルームに参加中のメンバー
    rooms: DashMap<RoomId, HashMap<ConnectionId, Member>>,
    /// 接続 ID → 参加中のルーム（1 接続 1 ルーム）
    index: DashMap<ConnectionId, RoomId>,
}

impl InMemoryConnectionRegistry {
    /// 新しい空の InMemoryConnectionRegistry を作成
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn join(&self, room_id: &RoomId, member: Member) -> Result<(), RegistryError> {
        let connection_id = member.connection_id;
        match self.index.entry(connection_id) {
            Entry::Occupied(current) => {
                if current.get() != room_id {
                    return Err(RegistryError::already_in_room(
                        &connection_id,
                        current.get(),
                    ));
                }
                // Already a member of this room: keep the original record.
                self.rooms
                    .entry(room_id.clone())
                    .or_default()
                    .entry(connection_id)
                    .or_insert(member);
            }
            Entry::Vacant(slot) => {
                self.rooms
                    .entry(room_id.clone())
                    .or_default()
                    .insert(connection_id, member);
                slot.insert(room_id.clone());
            }
        }
        Ok(())
    }

    fn leave(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.index
            .remove_if(connection_id, |_, joined| joined == room_id);

        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(mut members) => {
                members.get_mut().remove(connection_id);
                if members.get().is_empty() {
                    members.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => true,
        }
    }

    fn members_of(&self, room_id: &RoomId) -> HashSet<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    fn outboxes_of(&self, room_id: &RoomId) -> Vec<(ConnectionId, Outbox)> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .values()
                    .map(|m| (m.connection_id, m.outbox.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn members_detail(&self, room_id: &RoomId) -> Vec<Member> {
        self.rooms
            .get(room_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }
}

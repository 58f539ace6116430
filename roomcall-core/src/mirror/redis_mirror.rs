use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use super::MembershipMirror;
use crate::config::RedisConfig;
use crate::models::{ParticipantId, RoomId};
use crate::Result;

/// Redis-backed membership mirror.
///
/// Keys (all under `key_prefix`):
/// - `room:{id}:members` set of participant ids
/// - `participant:{id}` hash with `room_id` and `name`, expiring after `member_ttl_seconds`
/// - `stats:connections:total` and `stats:room:{id}:connections` counters
pub struct RedisMirror {
    conn: ConnectionManager,
    key_prefix: String,
    member_ttl_seconds: i64,
}

impl RedisMirror {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = client.get_connection_manager().await?;
        info!(key_prefix = %config.key_prefix, "Connected membership mirror to Redis");
        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            member_ttl_seconds: i64::try_from(config.member_ttl_seconds).unwrap_or(i64::MAX),
        })
    }

    fn members_key(&self, room_id: &RoomId) -> String {
        format!("{}room:{}:members", self.key_prefix, room_id.as_str())
    }

    fn participant_key(&self, participant_id: &ParticipantId) -> String {
        format!("{}participant:{}", self.key_prefix, participant_id.as_str())
    }

    fn total_connections_key(&self) -> String {
        format!("{}stats:connections:total", self.key_prefix)
    }

    fn room_connections_key(&self, room_id: &RoomId) -> String {
        format!("{}stats:room:{}:connections", self.key_prefix, room_id.as_str())
    }
}

#[async_trait]
impl MembershipMirror for RedisMirror {
    async fn add_member(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<()> {
        let members_key = self.members_key(room_id);
        let participant_key = self.participant_key(participant_id);

        let mut pipe = redis::pipe();
        pipe.sadd(&members_key, participant_id.as_str())
            .ignore()
            .expire(&members_key, self.member_ttl_seconds)
            .ignore()
            .hset_multiple(
                &participant_key,
                &[("room_id", room_id.as_str()), ("name", display_name)],
            )
            .ignore()
            .expire(&participant_key, self.member_ttl_seconds)
            .ignore();

        let mut conn = self.conn.clone();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn remove_member(&self, room_id: &RoomId, participant_id: &ParticipantId) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.srem(self.members_key(room_id), participant_id.as_str())
            .ignore()
            .del(self.participant_key(participant_id))
            .ignore();

        let mut conn = self.conn.clone();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn increment_connection_counter(&self, room_id: &RoomId) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.incr(self.total_connections_key(), 1)
            .ignore()
            .incr(self.room_connections_key(room_id), 1)
            .ignore();

        let mut conn = self.conn.clone();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

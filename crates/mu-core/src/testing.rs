//! Mock Matrix client for unit tests

use crate::client::{MatrixClient, Session};
use crate::error::ClientError;
use crate::room::Room;
use crate::types::ProfileInfo;
use serde_json::Value;
use std::sync::Arc;

mockall::mock! {
    pub(crate) Client {}

    #[async_trait::async_trait]
    impl MatrixClient for Client {
        fn session(&self) -> Option<Session>;
        fn room(&self, room_id: &str) -> Option<Arc<Room>>;
        async fn resolve_alias(&self, alias: &str) -> Result<String, ClientError>;
        async fn peek_state(&self, room_id: &str, event_type: &str, state_key: &str) -> Result<Option<Value>, ClientError>;
        async fn join_room(&self, room_id: &str) -> Result<(), ClientError>;
        async fn room_state(&self, room_id: &str, event_type: &str, state_key: &str) -> Result<Option<Value>, ClientError>;
        async fn profile_info(&self, user_id: &str) -> Result<ProfileInfo, ClientError>;
    }
}

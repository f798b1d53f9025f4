/// Message manager implementation
use super::{
    preview, Conversation, ConversationSummary, ConversationThread, Message, Participant,
    SendMessageRequest, SendMessageResponse,
};
use crate::{
    db,
    error::{MarketError, MarketResult},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const CONVERSATION_COLUMNS: &str = "conversation_id, ad_id, ad_title, ad_image, ad_price,
     participant_a, participant_b, last_message, last_message_at, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "message_id, conversation_id, sender_id, receiver_id, content, is_read, created_at";

/// Title used when the ad behind a new conversation no longer exists
const FALLBACK_AD_TITLE: &str = "Anunț";

/// Inbox size returned by the conversation list
const CONVERSATION_LIST_LIMIT: i64 = 100;

/// Message manager
pub struct MessageManager {
    db: SqlitePool,
}

impl MessageManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Send a message, opening the conversation for this ad and pair if needed
    pub async fn send(
        &self,
        sender_id: &str,
        req: SendMessageRequest,
    ) -> MarketResult<SendMessageResponse> {
        let (ad_id, receiver_id, content) = match (req.ad_id, req.receiver_id, req.content) {
            (Some(ad_id), Some(receiver_id), Some(content))
                if !ad_id.is_empty() && !receiver_id.is_empty() && !content.trim().is_empty() =>
            {
                (ad_id, receiver_id, content)
            }
            _ => return Err(MarketError::Validation("Missing required fields".to_string())),
        };

        if receiver_id == sender_id {
            return Err(MarketError::Validation(
                "Cannot send a message to yourself".to_string(),
            ));
        }

        let conversation_id = self
            .open_conversation(&ad_id, sender_id, &receiver_id)
            .await?;

        let message_id = db::generate_id("msg", 12);
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO messages (message_id, conversation_id, sender_id, receiver_id, content, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        )
        .bind(&message_id)
        .bind(&conversation_id)
        .bind(sender_id)
        .bind(&receiver_id)
        .bind(&content)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET last_message = ?1, last_message_at = ?2, updated_at = ?2
             WHERE conversation_id = ?3",
        )
        .bind(preview(&content))
        .bind(now)
        .bind(&conversation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "Message {} from {} in conversation {}",
            message_id,
            sender_id,
            conversation_id
        );

        Ok(SendMessageResponse {
            message_id,
            conversation_id,
        })
    }

    /// Existing conversation id for (ad, pair), or a new one with an ad snapshot
    async fn open_conversation(
        &self,
        ad_id: &str,
        sender_id: &str,
        receiver_id: &str,
    ) -> MarketResult<String> {
        let (first, second) = ordered_pair(sender_id, receiver_id);

        if let Some(id) = self.find_conversation_id(ad_id, first, second).await? {
            return Ok(id);
        }

        let snapshot = sqlx::query("SELECT title, images, price FROM ads WHERE ad_id = ?1")
            .bind(ad_id)
            .fetch_optional(&self.db)
            .await?;

        let (ad_title, ad_image, ad_price) = match snapshot {
            Some(row) => {
                let images: String = row.try_get("images")?;
                let images: Vec<String> = serde_json::from_str(&images).unwrap_or_default();
                (
                    row.try_get::<String, _>("title")?,
                    images.into_iter().next(),
                    row.try_get::<Option<f64>, _>("price")?,
                )
            }
            None => (FALLBACK_AD_TITLE.to_string(), None, None),
        };

        let now = Utc::now();

        // A concurrent send for the same pair may win the insert; the
        // unique index keeps one row and the lookup below returns it.
        sqlx::query(
            "INSERT INTO conversations (conversation_id, ad_id, ad_title, ad_image, ad_price,
                 participant_a, participant_b, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT (ad_id, participant_a, participant_b) DO NOTHING",
        )
        .bind(db::generate_id("conv", 12))
        .bind(ad_id)
        .bind(&ad_title)
        .bind(&ad_image)
        .bind(ad_price)
        .bind(first)
        .bind(second)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.find_conversation_id(ad_id, first, second)
            .await?
            .ok_or_else(|| MarketError::Internal("Conversation vanished after insert".to_string()))
    }

    async fn find_conversation_id(
        &self,
        ad_id: &str,
        first: &str,
        second: &str,
    ) -> MarketResult<Option<String>> {
        let id = sqlx::query_scalar(
            "SELECT conversation_id FROM conversations
             WHERE ad_id = ?1 AND participant_a = ?2 AND participant_b = ?3",
        )
        .bind(ad_id)
        .bind(first)
        .bind(second)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    /// A user's conversations, most recently active first
    pub async fn conversations(&self, user_id: &str) -> MarketResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC LIMIT ?2",
            CONVERSATION_COLUMNS
        ))
        .bind(user_id)
        .bind(CONVERSATION_LIST_LIMIT)
        .fetch_all(&self.db)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation = conversation_from_row(row)?;
            let other_user = self
                .participant(conversation.other_participant(user_id))
                .await?;

            let unread_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
            )
            .bind(&conversation.conversation_id)
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

            summaries.push(ConversationSummary {
                conversation,
                other_user,
                unread_count,
            });
        }

        Ok(summaries)
    }

    /// One page of a conversation; marks the reader's incoming messages read
    pub async fn thread(
        &self,
        conversation_id: &str,
        user_id: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> MarketResult<ConversationThread> {
        let conversation = self
            .find_conversation(conversation_id)
            .await?
            .filter(|c| c.includes(user_id))
            .ok_or_else(|| MarketError::NotFound("Conversation not found".to_string()))?;

        sqlx::query(
            "UPDATE messages SET is_read = 1
             WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        let (page, limit, offset) = db::paginate(page, limit, 50);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<MarketResult<Vec<_>>>()?;
        messages.reverse();

        let other_user = self
            .participant(conversation.other_participant(user_id))
            .await?;

        Ok(ConversationThread {
            conversation,
            other_user,
            messages,
            page,
        })
    }

    /// Unread messages addressed to a user across all conversations
    pub async fn unread_count(&self, user_id: &str) -> MarketResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn find_conversation(&self, conversation_id: &str) -> MarketResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE conversation_id = ?1",
            CONVERSATION_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn participant(&self, user_id: &str) -> MarketResult<Option<Participant>> {
        let row = sqlx::query("SELECT user_id, name, picture FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| {
            Ok(Participant {
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                picture: row.try_get("picture")?,
            })
        })
        .transpose()
    }
}

fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn conversation_from_row(row: &SqliteRow) -> MarketResult<Conversation> {
    Ok(Conversation {
        conversation_id: row.try_get("conversation_id")?,
        ad_id: row.try_get("ad_id")?,
        ad_title: row.try_get("ad_title")?,
        ad_image: row.try_get("ad_image")?,
        ad_price: row.try_get("ad_price")?,
        participants: [row.try_get("participant_a")?, row.try_get("participant_b")?],
        last_message: row.try_get("last_message")?,
        last_message_at: row.try_get("last_message_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> MarketResult<Message> {
    Ok(Message {
        message_id: row.try_get("message_id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        content: row.try_get("content")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(ad_id: &str, receiver_id: &str, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            ad_id: Some(ad_id.to_string()),
            receiver_id: Some(receiver_id.to_string()),
            content: Some(content.to_string()),
        }
    }

    async fn create_test_manager() -> MessageManager {
        MessageManager::new(db::create_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_pair_shares_one_conversation() {
        let manager = create_test_manager().await;

        let first = manager
            .send("user_buyer", send("ad_1", "user_seller", "Mai este disponibil?"))
            .await
            .unwrap();
        let reply = manager
            .send("user_seller", send("ad_1", "user_buyer", "Da"))
            .await
            .unwrap();
        assert_eq!(first.conversation_id, reply.conversation_id);

        let other_ad = manager
            .send("user_buyer", send("ad_2", "user_seller", "Si acesta?"))
            .await
            .unwrap();
        assert_ne!(first.conversation_id, other_ad.conversation_id);
    }

    #[tokio::test]
    async fn test_send_validation() {
        let manager = create_test_manager().await;

        let missing = SendMessageRequest {
            ad_id: Some("ad_1".to_string()),
            receiver_id: None,
            content: Some("hello".to_string()),
        };
        assert!(matches!(
            manager.send("user_a", missing).await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            manager.send("user_a", send("ad_1", "user_a", "hi")).await,
            Err(MarketError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unread_counts_and_reading() {
        let manager = create_test_manager().await;

        let sent = manager
            .send("user_buyer", send("ad_1", "user_seller", "Pret final?"))
            .await
            .unwrap();
        manager
            .send("user_buyer", send("ad_1", "user_seller", "Astept raspuns"))
            .await
            .unwrap();

        assert_eq!(manager.unread_count("user_seller").await.unwrap(), 2);
        assert_eq!(manager.unread_count("user_buyer").await.unwrap(), 0);

        let inbox = manager.conversations("user_seller").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].unread_count, 2);
        assert_eq!(inbox[0].conversation.ad_title, FALLBACK_AD_TITLE);
        assert_eq!(inbox[0].conversation.last_message.as_deref(), Some("Astept raspuns"));

        let thread = manager
            .thread(&sent.conversation_id, "user_seller", None, None)
            .await
            .unwrap();
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0].content, "Pret final?");
        assert_eq!(manager.unread_count("user_seller").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_thread() {
        let manager = create_test_manager().await;
        let sent = manager
            .send("user_buyer", send("ad_1", "user_seller", "Salut"))
            .await
            .unwrap();

        assert!(matches!(
            manager.thread(&sent.conversation_id, "user_other", None, None).await,
            Err(MarketError::NotFound(_))
        ));
    }
}

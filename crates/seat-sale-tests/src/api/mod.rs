use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eyre::Result;
use flume::Sender;
use nanorand::Rng;
use seat_sale_core::{
    CustomerActivity, CustomerId, EventId, EventView, Rank, ReservationHandle, SeatError,
};
use tokio::sync::oneshot;

pub mod mock;

/// Outcome of a request as reported by the seat service
pub type ApiResult<T> = std::result::Result<T, SeatError>;

type Reply<T> = oneshot::Sender<ApiResult<T>>;

enum RequestMsg {
    ListEvents {
        include_hidden: bool,
        reply: Reply<Vec<EventView>>,
    },
    Event {
        event: EventId,
        viewer: Option<CustomerId>,
        reply: Reply<EventView>,
    },
    Reserve {
        event: EventId,
        rank: Rank,
        customer: CustomerId,
        reply: Reply<ReservationHandle>,
    },
    Cancel {
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
        reply: Reply<()>,
    },
    CustomerActivity {
        customer: CustomerId,
        reply: Reply<CustomerActivity>,
    },
    Reinitialize {
        reply: Reply<()>,
    },
    /// Stop the receiving service thread
    Stop,
}

pub struct Api {
    /// One channel per service thread
    channels: Arc<Vec<Sender<RequestMsg>>>,
    /// Index of the channel the next clone uses
    next_index: Arc<AtomicUsize>,

    my_channel: Sender<RequestMsg>,
}

impl Api {
    fn new(channels: Vec<Sender<RequestMsg>>) -> Self {
        let my_channel = channels[0].clone();
        Self {
            channels: Arc::new(channels),
            next_index: Arc::new(AtomicUsize::new(1)),
            my_channel,
        }
    }
}

impl Clone for Api {
    /// Clones are spread round-robin over the service threads
    fn clone(&self) -> Self {
        let my_index = self.next_index.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        Self {
            channels: self.channels.clone(),
            next_index: self.next_index.clone(),
            my_channel: self.channels[my_index].clone(),
        }
    }
}

impl Api {
    async fn make_request<T>(
        &self,
        msg: impl FnOnce(Reply<T>) -> RequestMsg,
    ) -> Result<ApiResult<T>> {
        let (sender, receiver) = oneshot::channel();
        self.my_channel.send_async(msg(sender)).await?;
        Ok(receiver.await?)
    }

    pub async fn list_events(&self, include_hidden: bool) -> Result<ApiResult<Vec<EventView>>> {
        self.make_request(|reply| RequestMsg::ListEvents {
            include_hidden,
            reply,
        })
        .await
    }

    pub async fn event(
        &self,
        event: EventId,
        viewer: Option<CustomerId>,
    ) -> Result<ApiResult<EventView>> {
        self.make_request(|reply| RequestMsg::Event {
            event,
            viewer,
            reply,
        })
        .await
    }

    pub async fn reserve(
        &self,
        event: EventId,
        rank: Rank,
        customer: CustomerId,
    ) -> Result<ApiResult<ReservationHandle>> {
        self.make_request(|reply| RequestMsg::Reserve {
            event,
            rank,
            customer,
            reply,
        })
        .await
    }

    pub async fn cancel(
        &self,
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
    ) -> Result<ApiResult<()>> {
        self.make_request(|reply| RequestMsg::Cancel {
            event,
            rank,
            number,
            customer,
            reply,
        })
        .await
    }

    pub async fn customer_activity(
        &self,
        customer: CustomerId,
    ) -> Result<ApiResult<CustomerActivity>> {
        self.make_request(|reply| RequestMsg::CustomerActivity { customer, reply })
            .await
    }

    pub async fn reinitialize(&self) -> Result<ApiResult<()>> {
        self.make_request(|reply| RequestMsg::Reinitialize { reply })
            .await
    }

    /// Create a session for a new random customer
    ///
    /// Consecutive sessions are served by different service threads.
    pub fn create_user_session(&self) -> UserSession {
        let mut bytes = [0u8; 16];
        nanorand::tls_rng().fill(&mut bytes);
        UserSession {
            api: self.clone(),
            customer_id: uuid::Builder::from_random_bytes(bytes).into_uuid(),
        }
    }
}

pub struct UserSession {
    pub api: Api,
    pub customer_id: CustomerId,
}

impl UserSession {
    pub async fn event(&self, event: EventId) -> Result<ApiResult<EventView>> {
        self.api.event(event, Some(self.customer_id)).await
    }

    pub async fn reserve(
        &self,
        event: EventId,
        rank: Rank,
    ) -> Result<ApiResult<ReservationHandle>> {
        self.api.reserve(event, rank, self.customer_id).await
    }

    pub async fn cancel(&self, event: EventId, rank: Rank, number: u32) -> Result<ApiResult<()>> {
        self.api
            .cancel(event, rank, number, self.customer_id)
            .await
    }

    /// Cancel the reservation described by `handle`
    pub async fn release(&self, handle: &ReservationHandle) -> Result<ApiResult<()>> {
        self.cancel(handle.event, handle.rank, handle.number).await
    }

    pub async fn activity(&self) -> Result<ApiResult<CustomerActivity>> {
        self.api.customer_activity(self.customer_id).await
    }
}

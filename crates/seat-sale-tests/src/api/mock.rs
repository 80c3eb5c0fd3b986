//! Mock API implementation directly using the `seat-sale-engine` crate

use std::sync::Arc;

use eyre::{eyre, Result};
use flume::Sender;
use seat_sale_core::{Config, ReservationStore, SeatService};
use seat_sale_engine::{BoxOffice, SeatCache};
use tokio::task::{self, JoinHandle};
use tracing::debug;

use super::{Api, RequestMsg};

pub struct MockFrontend {
    office: Arc<BoxOffice>,
    senders: Vec<Sender<RequestMsg>>,
    join_handles: Vec<JoinHandle<()>>,
}

pub async fn start(
    threads: u16,
    config: Config,
    store: Arc<dyn ReservationStore>,
) -> Result<(MockFrontend, Api)> {
    let office = Arc::new(
        task::spawn_blocking(move || seat_sale_engine::launch(&config, store)).await??,
    );

    let it = (0..threads.max(1)).map(|_| {
        let (sender, receiver) = flume::bounded::<RequestMsg>(65536);
        let office = office.clone();
        let handle = task::spawn_blocking(move || {
            let office = &*office;
            for msg in receiver.into_iter() {
                if let RequestMsg::Stop = msg {
                    break;
                }
                serve(office, msg);
            }
        });
        (sender, handle)
    });
    let (senders, join_handles): (Vec<_>, _) = it.unzip();

    let frontend = MockFrontend {
        office,
        senders: senders.clone(),
        join_handles,
    };
    Ok((frontend, Api::new(senders)))
}

/// Answer a single request; requests whose sender gave up are dropped
fn serve(office: &BoxOffice, msg: RequestMsg) {
    match msg {
        RequestMsg::ListEvents {
            include_hidden,
            reply,
        } => {
            let _ = reply.send(office.list_events(include_hidden));
        }
        RequestMsg::Event {
            event,
            viewer,
            reply,
        } => {
            let _ = reply.send(office.event(event, viewer));
        }
        RequestMsg::Reserve {
            event,
            rank,
            customer,
            reply,
        } => {
            let _ = reply.send(office.reserve(event, rank, customer));
        }
        RequestMsg::Cancel {
            event,
            rank,
            number,
            customer,
            reply,
        } => {
            let _ = reply.send(office.cancel(event, rank, number, customer));
        }
        RequestMsg::CustomerActivity { customer, reply } => {
            let _ = reply.send(office.customer_activity(customer));
        }
        RequestMsg::Reinitialize { reply } => {
            let _ = reply.send(office.reinitialize());
        }
        RequestMsg::Stop => {}
    }
}

impl MockFrontend {
    pub fn cache(&self) -> Arc<SeatCache> {
        self.office.cache().clone()
    }

    /// Stop the service threads and shut down the box office
    ///
    /// Requests already queued are answered first; [`Api`] handles still
    /// alive afterwards fail to send.
    pub async fn shutdown(self) -> Result<()> {
        for sender in &self.senders {
            sender.send_async(RequestMsg::Stop).await?;
        }
        drop(self.senders);
        for handle in self.join_handles {
            handle.await?;
        }
        debug!("service threads stopped");
        let office = Arc::into_inner(self.office)
            .ok_or_else(|| eyre!("box office still referenced after the service threads stopped"))?;
        task::spawn_blocking(move || office.shutdown()).await?;
        Ok(())
    }
}

//! Test utilities & fixtures.
//! A session wired to an in-process chain, plus open chamber layouts.

use echoes::game::session::{GameSession, SessionEvent, SessionSettings};
use echoes::game::types::{CellType, Chamber};
use echoes::remote::local::LocalChain;
use echoes::storage::GameStore;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

pub const IDENTITY: &str = "0x0451";

/// `w`x`h` chamber of plain path, start at the origin and exit in the far corner.
pub fn open_chamber(chamber_id: u32, w: u32, h: u32) -> Chamber {
    Chamber {
        chamber_id,
        width: w,
        height: h,
        map: vec![CellType::Path.code(); (w * h) as usize],
        start_x: 0,
        start_y: 0,
        exit_x: w - 1,
        exit_y: h - 1,
        seed: 99,
    }
}

pub struct Harness {
    pub chain: Arc<LocalChain>,
    pub session: GameSession<LocalChain, LocalChain>,
    pub events: UnboundedReceiver<SessionEvent>,
}

impl Harness {
    pub fn new(store: GameStore) -> Self {
        Self::with_chain(Arc::new(LocalChain::new()), store)
    }

    pub fn with_chain(chain: Arc<LocalChain>, store: GameStore) -> Self {
        let (mut session, events) = GameSession::new(
            chain.clone(),
            chain.clone(),
            store,
            SessionSettings::default(),
        );
        session.connect(IDENTITY);
        Harness {
            chain,
            session: session.with_rng_seed(1234),
            events,
        }
    }

    /// Feed results back until nothing is in flight, stamping each with `now`.
    pub async fn settle_at(&mut self, now: Instant) {
        while self.session.in_flight() > 0 {
            let event = self.events.recv().await.expect("event channel open");
            self.session.handle_event(event, now);
        }
    }

    pub async fn settle(&mut self) {
        self.settle_at(Instant::now()).await;
    }

    /// Spawn a player and start a run.
    pub async fn spawn_and_start_run(&mut self) {
        self.session.spawn_player(Instant::now()).expect("spawn");
        self.settle().await;
        self.session.start_game(Instant::now()).expect("start game");
        self.settle().await;
    }
}

//! The bot: event plumbing, world model, actuation, and scripted actions.

pub mod actions;
pub mod actuator;
pub mod broker;
pub mod command;
pub mod dispatch;
pub mod parsers;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::bot::actuator::Actuator;
use crate::bot::broker::Broker;
use crate::bot::command::Console;
use crate::bot::dispatch::Dispatcher;
use crate::world::persist::Stores;
use crate::world::World;

/// One bot per process. The world model, the event broker, and the
/// dispatcher live for the life of the game connection; terminal clients
/// come and go, each getting a fresh [`Console`] over the same bot.
pub struct Bot {
    pub broker: Broker,
    pub world: World,
    pub actuator: Actuator,
    pub stores: Stores,
    pub dispatcher: Arc<Mutex<Dispatcher>>,
    game_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Bot {
    pub fn new(stores: Stores, game_tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        let broker = Broker::new();
        let world = World::new();
        let actuator = Actuator::new(broker.clone(), world.clone(), game_tx.clone());
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new(
            world.clone(),
            stores.clone(),
            broker.clone(),
        )));
        Self {
            broker,
            world,
            actuator,
            stores,
            dispatcher,
            game_tx,
        }
    }

    /// A command console for a newly connected client.
    pub fn console(&self) -> Console {
        Console::new(
            self.actuator.clone(),
            self.stores.clone(),
            Arc::clone(&self.dispatcher),
            self.game_tx.clone(),
        )
    }
}

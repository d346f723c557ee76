mod engine;
mod sim;
mod time;

pub use engine::{
    HandleCallback, HandleEvent, ItemStatus, MediaError, MediaHandle, MediaProvider, MediaResult,
    ObservedProperty, SubscriptionToken, TimeControlStatus,
};
pub use sim::{SeekRequest, SimulatedHandle, SimulatedMediaProvider};
pub use time::MediaTime;

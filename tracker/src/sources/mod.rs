pub mod committee_feeds;
pub mod committee_meetings;
pub mod congress;
pub mod federal_register;
pub mod openfema;
pub mod watchlist;

pub use committee_feeds::CommitteeFeeds;
pub use committee_meetings::CommitteeMeetings;
pub use congress::{CongressBills, CongressClient};
pub use federal_register::FederalRegister;
pub use openfema::OpenFema;
pub use watchlist::Watchlist;

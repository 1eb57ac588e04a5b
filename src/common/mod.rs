pub mod messages;
pub mod options;
pub mod parsing;

pub use self::messages::ServiceType;
pub use self::options::DiscoveryOptions;

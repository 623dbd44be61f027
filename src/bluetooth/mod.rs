pub mod adapter;
pub mod decoder;
pub mod scanner;
pub mod subscription;

pub use scanner::BluezScanner;
pub use subscription::AdvertisementHandler;

pub mod scraper;

pub use scraper::Scraper;

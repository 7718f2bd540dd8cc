pub mod assets;
pub mod children;
pub mod scrape_state;
pub mod tree;

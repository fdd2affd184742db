pub mod cohere;

pub use cohere::CohereClient;

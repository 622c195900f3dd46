pub mod fetcher_factory;

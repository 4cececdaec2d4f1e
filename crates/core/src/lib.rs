pub mod catalog;
pub mod cycle;
pub mod gateway;
pub mod instruction;
pub mod nav;
pub mod profile;
pub mod rating;
pub mod review;
pub mod session;
pub mod store;
pub mod survey;
pub mod voice;

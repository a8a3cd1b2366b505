pub mod commerce;
pub mod product;
pub mod refund;
pub mod return_request;

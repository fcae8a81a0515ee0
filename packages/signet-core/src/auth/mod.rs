//! Delegated browser-based login.
//!
//! The browser surface itself is a collaborator behind [`LoginPresenter`];
//! this module owns what every presenter shares: the hosted login page URL,
//! redirect interception, and the single-fire completion contract.

mod flow;

pub use flow::{
    AuthFlow, FlowOutcome, LoginPresenter, LoginRequest, TokenSink, callback_url, login_url,
    redirect_token,
};

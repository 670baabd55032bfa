//! Setup and re-authentication wizard for the Sonic integration
//!
//! A linear form flow: collect credentials, validate them against the cloud,
//! persist a config entry keyed by the lower-cased username. Validation
//! failures map to one of three user-facing error codes and re-show the
//! form; there is no retry logic.

mod flow;
mod validate;

pub use flow::{
    FlowResult, FormField, SetupFlow, UserInput, ABORT_ALREADY_CONFIGURED,
    ABORT_REAUTH_SUCCESSFUL, ERROR_INVALID_AUTH, ERROR_SERVICE_UNAVAILABLE, ERROR_UNKNOWN,
    STEP_REAUTH_CONFIRM, STEP_USER,
};
pub use validate::{CloudLoginValidator, LoginValidator, ValidatedAccount};

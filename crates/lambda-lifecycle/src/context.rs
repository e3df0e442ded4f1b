//! Invocation metadata supplied by the host platform

use serde::{Deserialize, Serialize};

/// Alias reported when the function was invoked by its bare version
pub const NO_ALIAS: &str = "NONE";

/// Immutable metadata for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Deployed function name
    pub function_name: String,
    /// Deployed function version (`$LATEST` or a number)
    pub function_version: String,
    /// ARN the function was invoked with; may end in an alias or version
    pub invoked_function_arn: String,
    /// Unique id of this invocation
    pub request_id: String,
}

impl InvocationContext {
    pub fn new(
        function_name: impl Into<String>,
        function_version: impl Into<String>,
        invoked_function_arn: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            function_version: function_version.into(),
            invoked_function_arn: invoked_function_arn.into(),
            request_id: request_id.into(),
        }
    }

    /// Stage/alias the function was invoked through.
    ///
    /// The last `:` segment of the invoked ARN, or [`NO_ALIAS`] when that
    /// segment is just the function version.
    pub fn alias(&self) -> String {
        let last = self
            .invoked_function_arn
            .rsplit(':')
            .next()
            .unwrap_or_default();
        if last != self.function_version {
            last.to_string()
        } else {
            NO_ALIAS.to_string()
        }
    }
}

impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(ctx: &lambda_runtime::Context) -> Self {
        Self {
            function_name: ctx.env_config.function_name.clone(),
            function_version: ctx.env_config.version.clone(),
            invoked_function_arn: ctx.invoked_function_arn.clone(),
            request_id: ctx.request_id.clone(),
        }
    }
}

pub const REFER_STATUS_IN_PROGRESS: &str = "in-progress";
pub const REFER_SIP_ACCEPTED: &str = "202";
pub const NOTIFY_SIP_OK: &str = "200";

/// Result of an agent handoff as reported by the carrier's refer callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub refer_call_status: Option<String>,
    pub refer_sip_response_code: Option<String>,
    pub notify_sip_response_code: Option<String>,
}

impl TransferOutcome {
    pub fn new(
        refer_call_status: impl Into<String>,
        refer_sip_response_code: impl Into<String>,
        notify_sip_response_code: impl Into<String>,
    ) -> Self {
        Self {
            refer_call_status: Some(refer_call_status.into()),
            refer_sip_response_code: Some(refer_sip_response_code.into()),
            notify_sip_response_code: Some(notify_sip_response_code.into()),
        }
    }

    /// Successful only for `in-progress` + REFER `202` + NOTIFY `200`.
    pub fn is_successful(&self) -> bool {
        self.refer_call_status.as_deref() == Some(REFER_STATUS_IN_PROGRESS)
            && self.refer_sip_response_code.as_deref() == Some(REFER_SIP_ACCEPTED)
            && self.notify_sip_response_code.as_deref() == Some(NOTIFY_SIP_OK)
    }

    pub fn status(&self) -> TransferStatus {
        if self.is_successful() {
            TransferStatus::Succeeded
        } else {
            TransferStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Requested,
    /// The call update itself was refused or never sent; no callback follows.
    RequestFailed,
    Succeeded,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Requested => "requested",
            TransferStatus::RequestFailed => "request_failed",
            TransferStatus::Succeeded => "succeeded",
            TransferStatus::Failed => "failed",
        }
    }
}

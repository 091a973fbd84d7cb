use serde::Serialize;
use serde_json::Number;

use super::rules::{
    FieldReader, PHONE_NUMBER, SHORT_CODE_RANGE, SIX_DIGITS, SIX_OR_MORE_DIGITS, TIMESTAMP,
};

pub const STK_TRANSACTION_TYPES: &[&str] = &["CustomerPayBillOnline", "CustomerBuyGoodsOnline"];
pub const REGISTER_RESPONSE_TYPES: &[&str] = &["Completed", "Cancelled"];
pub const B2C_COMMAND_IDS: &[&str] = &["SalaryPayment", "BusinessPayment", "PromotionPayment"];

/// One `{Key, Value}` entry of an STK push `ReferenceData` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferenceItem {
    key: String,
    value: String,
}

impl ReferenceItem {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Merchant-initiated push payment body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    business_short_code: String,
    password: String,
    timestamp: String,
    transaction_type: String,
    amount: Number,
    party_a: String,
    party_b: u64,
    phone_number: String,
    transaction_desc: String,
    #[serde(rename = "CallBackURL")]
    callback_url: String,
    account_reference: String,
    reference_data: Vec<ReferenceItem>,
}

impl StkPushRequest {
    pub(crate) fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let merchant_request_id = r.required_str("MerchantRequestID");
        let business_short_code = r.matching("BusinessShortCode", &SIX_DIGITS);
        let password = r.required_str("Password");
        let timestamp = r.matching("Timestamp", &TIMESTAMP);
        let transaction_type = r.one_of("TransactionType", STK_TRANSACTION_TYPES);
        let amount = r.positive_amount("Amount");
        let party_a = r.matching("PartyA", &PHONE_NUMBER);
        let party_b = r.int_in_range("PartyB", SHORT_CODE_RANGE);
        let phone_number = r.matching("PhoneNumber", &PHONE_NUMBER);
        let transaction_desc = r.max_len("TransactionDesc", 13);
        let callback_url = r.url("CallBackURL");
        let account_reference = r.max_len("AccountReference", 12);
        let reference_data = r.reference_items("ReferenceData");

        Some(Self {
            merchant_request_id: merchant_request_id?,
            business_short_code: business_short_code?,
            password: password?,
            timestamp: timestamp?,
            transaction_type: transaction_type?,
            amount: amount?,
            party_a: party_a?,
            party_b: party_b?,
            phone_number: phone_number?,
            transaction_desc: transaction_desc?,
            callback_url: callback_url?,
            account_reference: account_reference?,
            reference_data: reference_data?,
        })
    }

    #[must_use]
    pub fn merchant_request_id(&self) -> &str {
        &self.merchant_request_id
    }

    #[must_use]
    pub fn amount(&self) -> &Number {
        &self.amount
    }

    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    #[must_use]
    pub fn reference_data(&self) -> &[ReferenceItem] {
        &self.reference_data
    }
}

/// C2B confirmation/validation URL registration body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterUrlRequest {
    short_code: String,
    response_type: String,
    #[serde(rename = "CommandID")]
    command_id: String,
    #[serde(rename = "ConfirmationURL")]
    confirmation_url: String,
    #[serde(rename = "ValidationURL")]
    validation_url: String,
}

impl RegisterUrlRequest {
    pub(crate) fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let short_code = r.matching("ShortCode", &SIX_OR_MORE_DIGITS);
        let response_type = r.one_of("ResponseType", REGISTER_RESPONSE_TYPES);
        let command_id = r.one_of("CommandID", &["RegisterURL"]);
        let confirmation_url = r.url("ConfirmationURL");
        let validation_url = r.url("ValidationURL");

        Some(Self {
            short_code: short_code?,
            response_type: response_type?,
            command_id: command_id?,
            confirmation_url: confirmation_url?,
            validation_url: validation_url?,
        })
    }

    #[must_use]
    pub fn short_code(&self) -> &str {
        &self.short_code
    }

    #[must_use]
    pub fn confirmation_url(&self) -> &str {
        &self.confirmation_url
    }

    #[must_use]
    pub fn validation_url(&self) -> &str {
        &self.validation_url
    }
}

/// Business-to-customer disbursement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct B2cPaymentRequest {
    initiator_name: String,
    security_credential: String,
    #[serde(rename = "CommandID")]
    command_id: String,
    amount: Number,
    party_a: u64,
    party_b: String,
    remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    result_url: String,
    // The gateway's field name is misspelled.
    #[serde(rename = "Occassion", skip_serializing_if = "Option::is_none")]
    occasion: Option<String>,
}

impl B2cPaymentRequest {
    pub(crate) fn read(r: &mut FieldReader<'_>) -> Option<Self> {
        let initiator_name = r.required_str("InitiatorName");
        let security_credential = r.required_str("SecurityCredential");
        let command_id = r.one_of("CommandID", B2C_COMMAND_IDS);
        let amount = r.positive_amount("Amount");
        let party_a = r.int_in_range("PartyA", SHORT_CODE_RANGE);
        let party_b = r.matching("PartyB", &PHONE_NUMBER);
        let remarks = r.max_len("Remarks", 100);
        let queue_timeout_url = r.url("QueueTimeOutURL");
        let result_url = r.url("ResultURL");
        let occasion_field = if r.has("Occasion") {
            "Occasion"
        } else {
            "Occassion"
        };
        let occasion = r.optional_max_len(occasion_field, 100);

        Some(Self {
            initiator_name: initiator_name?,
            security_credential: security_credential?,
            command_id: command_id?,
            amount: amount?,
            party_a: party_a?,
            party_b: party_b?,
            remarks: remarks?,
            queue_timeout_url: queue_timeout_url?,
            result_url: result_url?,
            occasion: occasion?,
        })
    }

    #[must_use]
    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    #[must_use]
    pub fn amount(&self) -> &Number {
        &self.amount
    }

    #[must_use]
    pub fn occasion(&self) -> Option<&str> {
        self.occasion.as_deref()
    }
}

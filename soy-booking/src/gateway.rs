//! PayU hosted-checkout integration.
//!
//! Payment initiation is a signed form the browser posts to PayU; the outcome comes
//! back as a form-encoded callback whose reverse hash must be re-computed and
//! compared before any booking is touched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use soy_core::account::Customer;
use soy_core::booking::{Booking, PaymentMethod};
use soy_shared::Masked;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::BookingError;

/// udf2..udf10 are sent empty but still take part in both hash sequences.
const EMPTY_UDF_FIELDS: usize = 9;
const TXNID_RANDOM_DIGITS: usize = 22;

#[derive(Debug, Clone)]
pub struct PayuConfig {
    pub merchant_key: String,
    pub salt: Masked<String>,
    /// PayU checkout endpoint the browser form is posted to.
    pub payment_url: String,
    /// Public URL of our callback endpoint, used for both surl and furl.
    pub callback_url: String,
    pub frontend_url: String,
}

/// Form payload the frontend posts to PayU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
    pub key: String,
    pub txnid: String,
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub phone: String,
    pub surl: String,
    pub furl: String,
    pub hash: String,
    pub udf1: String,
    pub action: String,
}

/// Form-encoded notification PayU posts to surl/furl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayuCallback {
    #[serde(default)]
    pub mihpayid: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub txnid: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub productinfo: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub udf1: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub hash: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Success,
    Failure,
    /// Anything else PayU may report (`pending`, `in progress`, ...).
    Other(String),
}

impl CallbackStatus {
    pub fn classify(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "success" => CallbackStatus::Success,
            "failure" | "failed" | "cancelled" | "canceled" => CallbackStatus::Failure,
            other => CallbackStatus::Other(other.to_string()),
        }
    }
}

pub fn sha512_hex(input: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// `key|txnid|amount|productinfo|firstname|email|udf1|<9 empty>|salt`
#[allow(clippy::too_many_arguments)]
pub fn request_signing_string(
    key: &str,
    txnid: &str,
    amount: &str,
    productinfo: &str,
    firstname: &str,
    email: &str,
    udf1: &str,
    salt: &str,
) -> String {
    let mut fields = vec![key, txnid, amount, productinfo, firstname, email, udf1];
    fields.extend(std::iter::repeat("").take(EMPTY_UDF_FIELDS));
    fields.push(salt);
    fields.join("|")
}

/// `salt|status|<9 empty>|udf1|email|firstname|productinfo|amount|txnid|key`
pub fn response_signing_string(callback: &PayuCallback, key: &str, salt: &str) -> String {
    let mut fields = vec![salt, callback.status.as_str()];
    fields.extend(std::iter::repeat("").take(EMPTY_UDF_FIELDS));
    fields.extend([
        callback.udf1.as_str(),
        callback.email.as_str(),
        callback.firstname.as_str(),
        callback.productinfo.as_str(),
        callback.amount.as_str(),
        callback.txnid.as_str(),
        key,
    ]);
    fields.join("|")
}

pub struct PayuGateway {
    config: PayuConfig,
}

impl PayuGateway {
    pub fn new(config: PayuConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PayuConfig {
        &self.config
    }

    pub fn new_transaction_id() -> String {
        let simple = Uuid::new_v4().simple().to_string();
        format!("TXN{}", &simple[..TXNID_RANDOM_DIGITS])
    }

    /// Build a signed payment form with a fresh transaction id.
    pub fn build_request(&self, booking: &Booking, customer: Option<&Customer>) -> PaymentRequest {
        self.build_request_with_txnid(booking, customer, Self::new_transaction_id())
    }

    pub fn build_request_with_txnid(
        &self,
        booking: &Booking,
        customer: Option<&Customer>,
        txnid: String,
    ) -> PaymentRequest {
        let amount = booking.total_amount.to_string();
        let productinfo = match booking.event_id {
            Some(event_id) => format!("Booking for Event ID: {}", event_id),
            None => "Booking for Event ID: N/A".to_string(),
        };
        let firstname = customer
            .map(|c| c.first_name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Guest".to_string());
        let email = customer
            .map(|c| c.email.clone())
            .unwrap_or_else(|| "guest@example.com".to_string());
        let phone = customer
            .and_then(|c| c.phone.clone())
            .unwrap_or_else(|| "0000000000".to_string());
        let udf1 = booking.id.to_string();

        let hash = sha512_hex(&request_signing_string(
            &self.config.merchant_key,
            &txnid,
            &amount,
            &productinfo,
            &firstname,
            &email,
            &udf1,
            self.config.salt.expose(),
        ));

        PaymentRequest {
            key: self.config.merchant_key.clone(),
            txnid,
            amount,
            productinfo,
            firstname,
            email,
            phone,
            surl: self.config.callback_url.clone(),
            furl: self.config.callback_url.clone(),
            hash,
            udf1,
            action: self.config.payment_url.clone(),
        }
    }

    /// Re-compute the reverse hash and compare it in constant time.
    pub fn verify_callback(&self, callback: &PayuCallback) -> Result<CallbackStatus, BookingError> {
        let expected = sha512_hex(&response_signing_string(
            callback,
            &self.config.merchant_key,
            self.config.salt.expose(),
        ));
        let provided = callback.hash.trim().to_ascii_lowercase();

        if provided.is_empty() || provided.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
            return Err(BookingError::SignatureMismatch);
        }

        Ok(CallbackStatus::classify(&callback.status))
    }

    /// Gateway-reported payment mode mapped onto our enumeration, `payu` when unmapped.
    pub fn payment_method_for_mode(mode: &str) -> PaymentMethod {
        match mode.trim().to_ascii_uppercase().as_str() {
            "CC" | "DC" | "CARD" => PaymentMethod::Card,
            "UPI" => PaymentMethod::Upi,
            "NB" => PaymentMethod::Netbanking,
            "CASH" | "WALLET" => PaymentMethod::Wallet,
            _ => PaymentMethod::Payu,
        }
    }

    /// Frontend page the customer lands on after a callback.
    pub fn status_redirect(&self, status: &str, booking_id: Uuid, txnid: &str) -> Result<String, BookingError> {
        let booking_id = booking_id.to_string();
        let query = serde_urlencoded::to_string([("status", status), ("bookingId", booking_id.as_str()), ("txnid", txnid)])
            .map_err(|e| BookingError::Validation(format!("Failed to build redirect URL: {e}")))?;

        Ok(format!(
            "{}/payment-status?{}",
            self.config.frontend_url.trim_end_matches('/'),
            query
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use soy_core::booking::{BookingDraft, TicketType};

    fn config() -> PayuConfig {
        PayuConfig {
            merchant_key: "testkey".to_string(),
            salt: Masked::from("testsalt"),
            payment_url: "https://test.payu.in/_payment".to_string(),
            callback_url: "http://localhost:3000/api/bookings/payu-callback".to_string(),
            frontend_url: "http://localhost:5173/".to_string(),
        }
    }

    fn booking() -> Booking {
        let draft = BookingDraft {
            user_id: Some(Uuid::new_v4()),
            ticket_type: Some(TicketType::General),
            total_amount: Some(1161),
            discount_amount: 150,
            aadhar_number: "123412341234".into(),
            ..Default::default()
        };
        Booking::from_draft(draft, "SOY3", Utc::now()).unwrap()
    }

    fn signed_callback(gateway: &PayuGateway, status: &str) -> PayuCallback {
        let mut callback = PayuCallback {
            mihpayid: "403993715521".to_string(),
            status: status.to_string(),
            txnid: "TXN123".to_string(),
            amount: "1161".to_string(),
            productinfo: "Booking for Event ID: N/A".to_string(),
            firstname: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            udf1: "b1".to_string(),
            ..Default::default()
        };
        callback.hash = sha512_hex(&response_signing_string(
            &callback,
            &gateway.config().merchant_key,
            gateway.config().salt.expose(),
        ));
        callback
    }

    #[test]
    fn test_known_request_hash() {
        let signing = request_signing_string(
            "testkey",
            "TXN123",
            "1161",
            "Booking for Event ID: N/A",
            "Asha",
            "asha@example.com",
            "b1",
            "testsalt",
        );
        assert_eq!(signing.matches('|').count(), 16);
        assert_eq!(
            sha512_hex(&signing),
            "91670bc324ca201b31424714b9fd927dbf6d812086f89afee08766bf9cc85845409861489f77b4dc7314121e53f9e80db454f6ba2e2498f233a442a09b94bf0e"
        );
    }

    #[test]
    fn test_known_response_hash() {
        let gateway = PayuGateway::new(config());
        let callback = signed_callback(&gateway, "success");
        assert_eq!(
            callback.hash,
            "0845d4ed76f68ff39d9cfb4d3225235da5ecf7d1d6d78c04796e45ee1b43e450ce78747dc83361fead96c8f0e70a0b97cdf91c5baaf5970403564746c71ed3b1"
        );
    }

    #[test]
    fn test_build_request_is_signed_and_deterministic_per_txnid() {
        let gateway = PayuGateway::new(config());
        let booking = booking();

        let a = gateway.build_request_with_txnid(&booking, None, "TXNFIXED".to_string());
        let b = gateway.build_request_with_txnid(&booking, None, "TXNFIXED".to_string());
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 128);
        assert_eq!(a.hash, a.hash.to_lowercase());
        assert_eq!(a.amount, "1161");
        assert_eq!(a.udf1, booking.id.to_string());
        assert_eq!(a.firstname, "Guest");
        assert_eq!(a.action, "https://test.payu.in/_payment");

        // Changing any single signed field changes the hash
        let c = gateway.build_request_with_txnid(&booking, None, "TXNOTHER".to_string());
        assert_ne!(a.hash, c.hash);
        let mut cheaper = booking.clone();
        cheaper.total_amount = 1;
        let d = gateway.build_request_with_txnid(&cheaper, None, "TXNFIXED".to_string());
        assert_ne!(a.hash, d.hash);
    }

    #[test]
    fn test_fresh_transaction_ids() {
        let a = PayuGateway::new_transaction_id();
        let b = PayuGateway::new_transaction_id();
        assert!(a.starts_with("TXN"));
        assert_eq!(a.len(), 25);
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_callback() {
        let gateway = PayuGateway::new(config());

        let success = signed_callback(&gateway, "success");
        assert_eq!(gateway.verify_callback(&success).unwrap(), CallbackStatus::Success);

        let failure = signed_callback(&gateway, "failure");
        assert_eq!(gateway.verify_callback(&failure).unwrap(), CallbackStatus::Failure);

        let pending = signed_callback(&gateway, "pending");
        assert_eq!(
            gateway.verify_callback(&pending).unwrap(),
            CallbackStatus::Other("pending".to_string())
        );
    }

    #[test]
    fn test_tampered_callback_is_rejected() {
        let gateway = PayuGateway::new(config());

        let mut tampered = signed_callback(&gateway, "success");
        tampered.amount = "1".to_string();
        assert!(matches!(
            gateway.verify_callback(&tampered),
            Err(BookingError::SignatureMismatch)
        ));

        let mut forged = signed_callback(&gateway, "success");
        forged.hash = "00".repeat(64);
        assert!(gateway.verify_callback(&forged).is_err());

        let mut missing = signed_callback(&gateway, "success");
        missing.hash.clear();
        assert!(gateway.verify_callback(&missing).is_err());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(CallbackStatus::classify("SUCCESS"), CallbackStatus::Success);
        assert_eq!(CallbackStatus::classify("canceled"), CallbackStatus::Failure);
        assert_eq!(CallbackStatus::classify("cancelled"), CallbackStatus::Failure);
        assert_eq!(CallbackStatus::classify("failed"), CallbackStatus::Failure);
    }

    #[test]
    fn test_payment_mode_mapping() {
        assert_eq!(PayuGateway::payment_method_for_mode("CC"), PaymentMethod::Card);
        assert_eq!(PayuGateway::payment_method_for_mode("upi"), PaymentMethod::Upi);
        assert_eq!(PayuGateway::payment_method_for_mode("NB"), PaymentMethod::Netbanking);
        assert_eq!(PayuGateway::payment_method_for_mode("EMI"), PaymentMethod::Payu);
        assert_eq!(PayuGateway::payment_method_for_mode(""), PaymentMethod::Payu);
    }

    #[test]
    fn test_status_redirect() {
        let gateway = PayuGateway::new(config());
        let id = Uuid::nil();
        assert_eq!(
            gateway.status_redirect("success", id, "TXN1").unwrap(),
            format!("http://localhost:5173/payment-status?status=success&bookingId={}&txnid=TXN1", id)
        );
    }

    #[test]
    fn test_status_redirect_encodes_query_values() {
        let gateway = PayuGateway::new(config());
        let url = gateway
            .status_redirect("success", Uuid::nil(), "TXN 1&status=failure#x")
            .unwrap();

        assert!(url.ends_with("&txnid=TXN+1%26status%3Dfailure%23x"), "{}", url);
        assert_eq!(url.matches("status=").count(), 1);
    }
}

use crate::config::GatewayConfig;
use crate::errors::ServiceError;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::collections::BTreeMap;
use tracing::{instrument, warn};
use url::Url;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

/// Parsed result of a gateway return callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResult {
    pub transaction_id: String,
    pub amount: Decimal,
    pub success: bool,
    pub bank_code: Option<String>,
    pub response_code: Option<String>,
    pub order_info: Option<String>,
}

/// Hosted payment gateway collaborator.
///
/// `create_payment_url` builds the signed redirect URL the buyer is sent to;
/// `parse_return` verifies and decodes the query parameters the gateway
/// appends when redirecting the buyer back.
#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    fn create_payment_url(
        &self,
        amount: Decimal,
        description: &str,
    ) -> Result<String, ServiceError>;
    fn parse_return(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<GatewayResult, ServiceError>;
}

/// Gateway client producing HMAC-SHA512-signed hosted-payment URLs.
///
/// The signature is computed over the url-encoded query with keys in
/// lexicographic order, which is also how callbacks are verified.
#[derive(Clone)]
pub struct HostedGatewayClient {
    config: GatewayConfig,
}

impl HostedGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn encode_query(params: &BTreeMap<String, String>) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl PaymentGateway for HostedGatewayClient {
    #[instrument(skip(self))]
    fn create_payment_url(
        &self,
        amount: Decimal,
        description: &str,
    ) -> Result<String, ServiceError> {
        // The gateway expects the amount in minor units
        let amount_minor = (amount * Decimal::from(100)).trunc().to_i64().ok_or_else(|| {
            ServiceError::ValidationError(format!("amount {} out of range", amount))
        })?;
        if amount_minor <= 0 {
            return Err(ServiceError::ValidationError(
                "payment amount must be positive".to_string(),
            ));
        }

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), "2.1.0".to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert(
            "vnp_TmnCode".to_string(),
            self.config.merchant_code.clone(),
        );
        params.insert("vnp_Amount".to_string(), amount_minor.to_string());
        params.insert("vnp_TxnRef".to_string(), Uuid::new_v4().to_string());
        params.insert("vnp_OrderInfo".to_string(), description.to_string());
        params.insert(
            "vnp_CreateDate".to_string(),
            Utc::now().format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert(
            "vnp_ReturnUrl".to_string(),
            self.config.return_url.clone(),
        );

        let query = Self::encode_query(&params);
        let signature = self.sign(&query);

        let mut redirect = Url::parse(&self.config.base_url).map_err(|e| {
            ServiceError::InternalError(format!("gateway base url: {}", e))
        })?;
        redirect.set_query(Some(&format!("{}&vnp_SecureHash={}", query, signature)));
        Ok(redirect.to_string())
    }

    #[instrument(skip(self, params))]
    fn parse_return(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<GatewayResult, ServiceError> {
        let provided_hash = params.get("vnp_SecureHash").ok_or_else(|| {
            ServiceError::ValidationError("missing gateway signature".to_string())
        })?;

        let mut signed: BTreeMap<String, String> = params.clone();
        signed.remove("vnp_SecureHash");
        signed.remove("vnp_SecureHashType");
        let expected = self.sign(&Self::encode_query(&signed));

        if expected != *provided_hash {
            warn!("gateway callback signature mismatch");
            return Err(ServiceError::Unauthorized(
                "invalid gateway signature".to_string(),
            ));
        }

        let transaction_id = params
            .get("vnp_TransactionNo")
            .cloned()
            .ok_or_else(|| ServiceError::ValidationError("missing transaction id".to_string()))?;
        let amount_minor: i64 = params
            .get("vnp_Amount")
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| ServiceError::ValidationError("missing amount".to_string()))?;
        let response_code = params.get("vnp_ResponseCode").cloned();
        // "00" is the gateway's only success code
        let success = response_code.as_deref() == Some("00");

        Ok(GatewayResult {
            transaction_id,
            amount: Decimal::from(amount_minor) / Decimal::from(100),
            success,
            bank_code: params.get("vnp_BankCode").cloned(),
            response_code,
            order_info: params.get("vnp_OrderInfo").cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use rust_decimal_macros::dec;

    fn client() -> HostedGatewayClient {
        HostedGatewayClient::new(GatewayConfig {
            base_url: "https://sandbox.gateway.test/paymentv2/vpcpay.html".into(),
            merchant_code: "MKT0001".into(),
            hash_secret: "0123456789abcdef0123456789abcdef".into(),
            return_url: "http://localhost:8080/payments/return".into(),
        })
    }

    #[test]
    fn payment_url_carries_amount_and_signature() {
        let url = client()
            .create_payment_url(dec!(150.50), "checkout 2 orders")
            .unwrap();
        assert!(url.contains("vnp_Amount=15050"));
        assert!(url.contains("vnp_SecureHash="));
        assert!(url.starts_with("https://sandbox.gateway.test/"));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let err = client().create_payment_url(Decimal::ZERO, "x").unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn parse_return_round_trips_signed_params() {
        let gateway = client();
        let mut params = BTreeMap::new();
        params.insert("vnp_TransactionNo".to_string(), "14422574".to_string());
        params.insert("vnp_Amount".to_string(), "15050".to_string());
        params.insert("vnp_ResponseCode".to_string(), "00".to_string());
        params.insert("vnp_BankCode".to_string(), "NCB".to_string());
        params.insert("vnp_OrderInfo".to_string(), "checkout".to_string());

        let signature = gateway.sign(&HostedGatewayClient::encode_query(&params));
        params.insert("vnp_SecureHash".to_string(), signature);

        let result = gateway.parse_return(&params).unwrap();
        assert!(result.success);
        assert_eq!(result.transaction_id, "14422574");
        assert_eq!(result.amount, dec!(150.50));
        assert_eq!(result.bank_code.as_deref(), Some("NCB"));
    }

    #[test]
    fn parse_return_rejects_tampered_params() {
        let gateway = client();
        let mut params = BTreeMap::new();
        params.insert("vnp_TransactionNo".to_string(), "14422574".to_string());
        params.insert("vnp_Amount".to_string(), "15050".to_string());
        params.insert("vnp_ResponseCode".to_string(), "00".to_string());

        let signature = gateway.sign(&HostedGatewayClient::encode_query(&params));
        params.insert("vnp_SecureHash".to_string(), signature);
        // Tamper after signing
        params.insert("vnp_Amount".to_string(), "1".to_string());

        let err = gateway.parse_return(&params).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn failed_response_code_maps_to_unsuccessful_result() {
        let gateway = client();
        let mut params = BTreeMap::new();
        params.insert("vnp_TransactionNo".to_string(), "99".to_string());
        params.insert("vnp_Amount".to_string(), "5000".to_string());
        params.insert("vnp_ResponseCode".to_string(), "24".to_string());

        let signature = gateway.sign(&HostedGatewayClient::encode_query(&params));
        params.insert("vnp_SecureHash".to_string(), signature);

        let result = gateway.parse_return(&params).unwrap();
        assert!(!result.success);
        assert_eq!(result.response_code.as_deref(), Some("24"));
    }
}

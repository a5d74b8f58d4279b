use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use agoradeals_common::traits::ledger_traits::*;
use crate::http::{DefaultHttpClient, HttpClient};
use crate::Error;

/// Reply envelope of the ledger gateway.
#[derive(Debug, Deserialize)]
struct GatewayReply<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    version: String,
}

/// Forwards ledger calls to an HTTP gateway as `POST {base}/{operation}`.
pub struct HttpLedgerClient<C = DefaultHttpClient> {
    base: Url,
    client: C,
}

impl HttpLedgerClient<DefaultHttpClient> {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::with_client(base_url, DefaultHttpClient::new())
    }
}

impl<C> HttpLedgerClient<C>
where
    C: HttpClient<Error = Error>,
{
    pub fn with_client(base_url: &str, client: C) -> Result<Self, Error> {
        // Url::join drops the last path segment unless it ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("Invalid ledger URL '{}': {}", base_url, e)))?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, operation: &str) -> Result<String, Error> {
        self.base
            .join(operation)
            .map(|u| u.to_string())
            .map_err(|e| Error::Config(format!("Invalid ledger operation '{}': {}", operation, e)))
    }

    async fn call<Req, Resp>(&self, operation: &str, req: &Req) -> Result<Resp, Error>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let url = self.endpoint(operation)?;
        let body = serde_json::to_string(req)?;
        debug!("ledger gateway -> {}", url);
        let raw = self.client.post_json(url, body).await?;
        unwrap_reply(operation, &raw)
    }
}

fn unwrap_reply<T: DeserializeOwned>(operation: &str, raw: &str) -> Result<T, Error> {
    let reply: GatewayReply<T> = serde_json::from_str(raw)
        .map_err(|e| Error::Ledger(format!("Malformed ledger reply for {}: {}", operation, e)))?;
    match (reply.success, reply.data) {
        (true, Some(data)) => Ok(data),
        (true, None) => Err(Error::Ledger(format!("Empty ledger reply for {}", operation))),
        (false, _) => {
            let msg = reply
                .error
                .unwrap_or_else(|| format!("Ledger rejected {}", operation));
            warn!("ledger gateway rejected {}: {}", operation, msg);
            Err(Error::Ledger(msg))
        }
    }
}

#[async_trait]
impl<C> LedgerService for HttpLedgerClient<C>
where
    C: HttpClient<Error = Error>,
{
    async fn version(&self) -> Result<String, Error> {
        let raw = self.client.get(self.endpoint("version")?, HashMap::new()).await?;
        let info: VersionInfo = unwrap_reply("version", &raw)?;
        Ok(info.version)
    }

    async fn register_merchant(&self, req: &RegisterMerchantRequest) -> Result<MerchantReceipt, Error> {
        self.call("register-merchant", req).await
    }

    async fn create_promotion(&self, req: &CreatePromotionRequest) -> Result<PromotionReceipt, Error> {
        self.call("create-promotion", req).await
    }

    async fn mint_coupon(&self, req: &MintCouponRequest) -> Result<MintReceipt, Error> {
        self.call("mint-coupon", req).await
    }

    async fn transfer_coupon(&self, req: &TransferCouponRequest) -> Result<Settlement, Error> {
        self.call("transfer-coupon", req).await
    }

    async fn list_coupon_for_sale(&self, req: &ListCouponRequest) -> Result<ListingReceipt, Error> {
        self.call("list-coupon", req).await
    }

    async fn cancel_listing(&self, req: &CancelListingRequest) -> Result<Settlement, Error> {
        self.call("cancel-listing", req).await
    }

    async fn buy_listing(&self, req: &BuyListingRequest) -> Result<Settlement, Error> {
        self.call("buy-listing", req).await
    }

    async fn generate_redemption_ticket(&self, req: &GenerateTicketRequest) -> Result<TicketReceipt, Error> {
        self.call("generate-redemption-ticket", req).await
    }

    async fn verify_and_redeem_ticket(&self, req: &RedeemTicketRequest) -> Result<Settlement, Error> {
        self.call("verify-and-redeem-ticket", req).await
    }

    async fn cancel_redemption_ticket(&self, req: &CancelTicketRequest) -> Result<Settlement, Error> {
        self.call("cancel-redemption-ticket", req).await
    }

    async fn create_group_deal(&self, req: &CreateGroupDealRequest) -> Result<GroupDealReceipt, Error> {
        self.call("create-group-deal", req).await
    }

    async fn join_group_deal(&self, req: &JoinGroupDealRequest) -> Result<Settlement, Error> {
        self.call("join-group-deal", req).await
    }

    async fn finalize_group_deal(&self, req: &FinalizeGroupDealRequest) -> Result<Settlement, Error> {
        self.call("finalize-group-deal", req).await
    }

    async fn create_auction(&self, req: &CreateAuctionRequest) -> Result<AuctionReceipt, Error> {
        self.call("create-auction", req).await
    }

    async fn place_auction_bid(&self, req: &PlaceBidRequest) -> Result<Settlement, Error> {
        self.call("place-auction-bid", req).await
    }

    async fn buy_dutch_auction(&self, req: &BuyDutchAuctionRequest) -> Result<PurchaseReceipt, Error> {
        self.call("buy-dutch-auction", req).await
    }

    async fn settle_auction(&self, req: &SettleAuctionRequest) -> Result<AuctionSettlementReceipt, Error> {
        self.call("settle-auction", req).await
    }

    async fn cancel_auction(&self, req: &CancelAuctionRequest) -> Result<Settlement, Error> {
        self.call("cancel-auction", req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    /// Records requests and answers every call with a fixed body.
    #[derive(Clone)]
    struct CannedClient {
        reply: String,
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Self {
            Self { reply: reply.to_string(), seen: Arc::new(Mutex::new(Vec::new())) }
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        type Error = Error;

        async fn post_json(&self, url: String, body: String) -> Result<String, Error> {
            self.seen.lock().push((url, body));
            Ok(self.reply.clone())
        }

        async fn get(&self, url: String, _headers: HashMap<String, String>) -> Result<String, Error> {
            self.seen.lock().push((url, String::new()));
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn posts_camel_case_body_to_operation_path() {
        let client = CannedClient::new(r#"{"success":true,"data":{"signature":"sig-1"}}"#);
        let ledger = HttpLedgerClient::with_client("http://gateway.local/api", client.clone()).unwrap();

        let out = ledger
            .join_group_deal(&JoinGroupDealRequest {
                group_deal: "deal".into(),
                user: "user".into(),
                quantity: 3,
            })
            .await
            .unwrap();
        assert_eq!(out.signature, "sig-1");

        let seen = client.seen.lock();
        assert_eq!(seen[0].0, "http://gateway.local/api/join-group-deal");
        let body: serde_json::Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(body["groupDeal"], "deal");
        assert_eq!(body["quantity"], 3);
    }

    #[tokio::test]
    async fn auction_type_travels_in_snake_case() {
        let client = CannedClient::new(
            r#"{"success":true,"data":{"signature":"sig-2","auction":"auc","endTime":1700000000}}"#,
        );
        let ledger = HttpLedgerClient::with_client("http://gateway.local", client.clone()).unwrap();
        let receipt = ledger
            .create_auction(&CreateAuctionRequest {
                coupon: "coupon".into(),
                seller: "seller".into(),
                auction_id: 9,
                auction_type: agoradeals_common::models::AuctionType::SealedBid,
                starting_price: 100,
                reserve_price: 50,
                min_bid_increment: 5,
                duration_secs: 600,
                auto_extend: false,
            })
            .await
            .unwrap();
        assert_eq!(receipt.end_time, 1_700_000_000);

        let seen = client.seen.lock();
        assert_eq!(seen[0].0, "http://gateway.local/create-auction");
        let body: serde_json::Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(body["auctionType"], "sealed_bid");
        assert_eq!(body["durationSecs"], 600);
    }

    #[tokio::test]
    async fn gateway_rejection_becomes_ledger_error() {
        let client = CannedClient::new(r#"{"success":false,"error":"Ticket expired"}"#);
        let ledger = HttpLedgerClient::with_client("http://gateway.local", client).unwrap();
        let err = ledger
            .cancel_redemption_ticket(&CancelTicketRequest { ticket: "t".into(), user: "u".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ledger(m) if m == "Ticket expired"));
    }

    #[tokio::test]
    async fn version_reads_data_field() {
        let client = CannedClient::new(r#"{"success":true,"data":{"version":"gw-2.1"}}"#);
        let ledger = HttpLedgerClient::with_client("http://gateway.local/", client).unwrap();
        assert_eq!(ledger.version().await.unwrap(), "gw-2.1");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(HttpLedgerClient::new("not a url").is_err());
    }
}

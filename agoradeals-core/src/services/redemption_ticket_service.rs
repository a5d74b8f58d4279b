use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use agoradeals_common::{
    error::Error,
    models::{GeoStamp, RedemptionTicket, TicketStatus, VerificationMethod},
    traits::ledger_traits::{
        CancelTicketRequest, GenerateTicketRequest, LedgerService, RedeemTicketRequest,
    },
    traits::repository_traits::{CouponRepository, RedemptionTicketRepository, TicketQuery},
};
use crate::qr::{QrRenderer, TicketPayload};
use crate::utils::locks::KeyedLocks;
use crate::utils::time::Clock;
use crate::utils::validation::parse_hash;

/// Ticket listings are capped at this many rows, newest first.
pub const TICKET_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct GenerateTicket {
    pub coupon: String,
    pub wallet_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RedeemTicket {
    pub ticket: String,
    pub ticket_hash: String,
    pub merchant_wallet_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Issues, consumes and cancels the short-lived tickets a merchant scans to
/// redeem a coupon.
///
/// Ticket state only moves forward: `active` to `consumed` or `cancelled`.
/// `expired` is never stored; it is how an `active` ticket reads once its
/// deadline has passed.
pub struct RedemptionTicketService {
    tickets: Arc<dyn RedemptionTicketRepository>,
    coupons: Arc<dyn CouponRepository>,
    ledger: Arc<dyn LedgerService>,
    renderer: Arc<dyn QrRenderer>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl RedemptionTicketService {
    pub fn new(
        tickets: Arc<dyn RedemptionTicketRepository>,
        coupons: Arc<dyn CouponRepository>,
        ledger: Arc<dyn LedgerService>,
        renderer: Arc<dyn QrRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            coupons,
            ledger,
            renderer,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn generate_ticket(&self, req: GenerateTicket) -> Result<RedemptionTicket, Error> {
        let now = self.clock.now();
        let location = GeoStamp::from_coords(req.latitude, req.longitude, now)?;

        let coupon = self
            .coupons
            .get_coupon(&req.coupon)
            .await?
            .ok_or_else(|| Error::NotFound("Coupon not found".into()))?;
        coupon.ensure_owner(&req.wallet_address)?;

        // One issuer at a time per coupon, so the live-ticket check holds.
        let _guard = self.locks.lock(&format!("coupon:{}", coupon.on_chain_address)).await;
        let coupon = self
            .coupons
            .get_coupon(&coupon.on_chain_address)
            .await?
            .ok_or_else(|| Error::NotFound("Coupon not found".into()))?;
        coupon.ensure_owner(&req.wallet_address)?;
        coupon.ensure_not_redeemed("Coupon already redeemed")?;
        coupon.ensure_not_in_auction()?;
        if coupon.is_expired(now) {
            return Err(Error::Conflict("Coupon has expired".into()));
        }
        if let Some(live) = self
            .tickets
            .find_live_ticket_for_coupon(&coupon.on_chain_address, now)
            .await?
        {
            return Err(Error::Conflict(format!(
                "An active redemption ticket already exists for this coupon ({})",
                live.id
            )));
        }

        let nonce = now.timestamp();
        let receipt = self
            .ledger
            .generate_redemption_ticket(&GenerateTicketRequest {
                coupon: coupon.on_chain_address.clone(),
                user: req.wallet_address.clone(),
                nonce: nonce as u64,
                latitude: req.latitude,
                longitude: req.longitude,
            })
            .await?;

        let expires_at = crate::utils::time::from_epoch(receipt.expires_at);
        let payload = TicketPayload::new(
            &receipt.ticket,
            &coupon.on_chain_address,
            &req.wallet_address,
            &coupon.merchant,
            &receipt.ticket_hash,
            nonce,
            expires_at,
        )
        .encode()?;
        let data_url = self.renderer.render(&payload)?;

        let ticket = RedemptionTicket {
            id: Uuid::new_v4(),
            on_chain_address: receipt.ticket,
            coupon_address: coupon.on_chain_address.clone(),
            user_address: req.wallet_address,
            merchant_address: coupon.merchant.clone(),
            ticket_hash: receipt.ticket_hash,
            nonce,
            expires_at,
            status: TicketStatus::Active,
            consumed_at: None,
            generation_location: location,
            redemption_location: None,
            qr_code_data: Some(payload),
            qr_data_url: Some(data_url),
            verification_method: VerificationMethod::QrScan,
            generation_tx_signature: receipt.signature,
            redemption_tx_signature: None,
            cancellation_tx_signature: None,
            created_at: now,
            updated_at: now,
        };
        self.tickets.insert_ticket(&ticket).await?;

        info!(
            "Redemption ticket {} issued for coupon {} (expires {})",
            ticket.on_chain_address, ticket.coupon_address, ticket.expires_at
        );
        Ok(ticket)
    }

    pub async fn verify_and_redeem(&self, req: RedeemTicket) -> Result<RedemptionTicket, Error> {
        let expected_hash = parse_hash(&req.ticket_hash)?;

        let found = self.find(&req.ticket).await?;
        // Serialize per ticket; the re-read below sees any redemption that won the race.
        let _guard = self.locks.lock(&format!("ticket:{}", found.id)).await;
        let ticket = self.find(&found.id.to_string()).await?;

        let now = self.clock.now();
        let location = GeoStamp::from_coords(req.latitude, req.longitude, now)?;

        match ticket.effective_status(now) {
            TicketStatus::Active => {}
            TicketStatus::Consumed => return Err(Error::Conflict("Ticket already consumed".into())),
            TicketStatus::Cancelled => return Err(Error::Conflict("Ticket has been cancelled".into())),
            TicketStatus::Expired => return Err(Error::Conflict("Ticket has expired".into())),
        }
        if ticket.merchant_address != req.merchant_wallet_address {
            return Err(Error::Forbidden("Not authorized to redeem this ticket".into()));
        }
        if hex::encode(expected_hash) != ticket.ticket_hash.to_lowercase() {
            return Err(Error::Validation("Ticket hash does not match".into()));
        }

        // The ticket only speaks for whoever owned the coupon when it was issued.
        let coupon = self
            .coupons
            .get_coupon(&ticket.coupon_address)
            .await?
            .ok_or_else(|| Error::NotFound("Coupon not found".into()))?;
        coupon.ensure_not_redeemed("Coupon already redeemed")?;
        coupon.ensure_not_in_auction()?;
        if coupon.owner != ticket.user_address {
            return Err(Error::Conflict(
                "Coupon is no longer owned by the ticket holder".into(),
            ));
        }

        let settlement = self
            .ledger
            .verify_and_redeem_ticket(&RedeemTicketRequest {
                ticket: ticket.on_chain_address.clone(),
                coupon: ticket.coupon_address.clone(),
                merchant: req.merchant_wallet_address.clone(),
                user: ticket.user_address.clone(),
                expected_hash,
            })
            .await?;

        let consumed = self
            .tickets
            .consume_ticket(ticket.id, now, location, &settlement.signature)
            .await?;
        if !consumed {
            warn!(
                "Ticket {} settled on the ledger but could not be consumed locally",
                ticket.on_chain_address
            );
            let current = self.find(&ticket.id.to_string()).await?;
            return Err(match current.status {
                TicketStatus::Consumed => Error::Conflict("Ticket already consumed".into()),
                TicketStatus::Cancelled => Error::Conflict("Ticket has been cancelled".into()),
                _ => Error::Conflict("Coupon is no longer owned by the ticket holder".into()),
            });
        }

        info!(
            "Ticket {} redeemed by merchant {} (tx {})",
            ticket.on_chain_address, req.merchant_wallet_address, settlement.signature
        );
        self.get_ticket(&ticket.id.to_string()).await
    }

    pub async fn cancel_ticket(&self, key: &str, wallet: &str) -> Result<RedemptionTicket, Error> {
        let found = self.find(key).await?;
        let _guard = self.locks.lock(&format!("ticket:{}", found.id)).await;
        let ticket = self.find(&found.id.to_string()).await?;

        if ticket.user_address != wallet {
            return Err(Error::Forbidden("Not authorized to cancel this ticket".into()));
        }
        match ticket.status {
            TicketStatus::Consumed => return Err(Error::Conflict("Cannot cancel consumed ticket".into())),
            TicketStatus::Cancelled => return Err(Error::Conflict("Ticket already cancelled".into())),
            _ => {}
        }

        let settlement = self
            .ledger
            .cancel_redemption_ticket(&CancelTicketRequest {
                ticket: ticket.on_chain_address.clone(),
                user: wallet.to_string(),
            })
            .await?;

        let now = self.clock.now();
        if !self.tickets.cancel_ticket(ticket.id, &settlement.signature, now).await? {
            return Err(Error::Conflict("Ticket is no longer active".into()));
        }

        info!("Ticket {} cancelled by {}", ticket.on_chain_address, wallet);
        self.get_ticket(&ticket.id.to_string()).await
    }

    /// Ticket as the caller should see it, with its effective status.
    pub async fn get_ticket(&self, key: &str) -> Result<RedemptionTicket, Error> {
        let now = self.clock.now();
        Ok(self.find(key).await?.observed_at(now))
    }

    pub async fn user_tickets(
        &self,
        user_address: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<RedemptionTicket>, Error> {
        self.tickets
            .list_tickets(&TicketQuery {
                user_address: Some(user_address.to_string()),
                merchant_address: None,
                status,
                now: self.clock.now(),
                limit: TICKET_LIST_LIMIT,
            })
            .await
    }

    pub async fn merchant_tickets(
        &self,
        merchant_address: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<RedemptionTicket>, Error> {
        self.tickets
            .list_tickets(&TicketQuery {
                user_address: None,
                merchant_address: Some(merchant_address.to_string()),
                status,
                now: self.clock.now(),
                limit: TICKET_LIST_LIMIT,
            })
            .await
    }

    async fn find(&self, key: &str) -> Result<RedemptionTicket, Error> {
        self.tickets
            .get_ticket(key)
            .await?
            .ok_or_else(|| Error::NotFound("Redemption ticket not found".into()))
    }
}

//! Inbound and outbound game events.
//!
//! Both enums are adjacently tagged: the variant name goes in `type` and the
//! fields go in `event_data`. Variant names are snake_case on the wire, with
//! two exceptions the deployed clients depend on: `choose_Offer` and
//! `Offer_selected`.
//!
//! All `timeout` fields are milliseconds. They tell the client how long the
//! current prompt or screen stays up.

use serde::{Deserialize, Serialize};

use crate::{Card, Offer, PlayerId, ScoreLine, SumLine};

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "event_data", rename_all = "snake_case")]
pub enum ServerEvent {
    // -- Registration --
    /// Reply to `set_name_request`, sent only to the registering connection.
    SetNameResponse { assigned_player_id: PlayerId },

    /// A player registered. Sent to every other connection.
    PlayerJoined { player_id: PlayerId, name: String },

    /// A request was refused. `code` follows HTTP conventions
    /// (409 = table full or name in use).
    Error { code: u16, message: String },

    // -- Dealing --
    /// A new round is being dealt.
    DealingCards {},

    /// The recipient's private five-card hand.
    CardsDealt { cards: Vec<Card> },

    /// The recipient's hand after a settlement swap.
    CardsUpdate { cards: Vec<Card> },

    // -- Bidding --
    /// The current player must bid a card.
    ChooseBid {
        player_id: PlayerId,
        timeout: u64,
        can_finish_round: bool,
    },

    /// The hub shows a face-down bid.
    ShowBackOfCardBid { timeout: u64 },

    /// The bid card, revealed.
    BidSelected { card: Card, timeout: u64 },

    // -- Offers --
    /// Eligible players must each offer a card.
    #[serde(rename = "choose_Offer")]
    ChooseOffer {
        player_ids: Vec<PlayerId>,
        timeout: u64,
    },

    /// Players who have an offer in so far.
    MadeOffer { player_ids: Vec<PlayerId> },

    /// Confirms which card was taken as the recipient's offer.
    #[serde(rename = "Offer_selected")]
    OfferSelected { card: Card },

    /// Offer collection closed; these are the offers on the table.
    OffersFinished { offers: Vec<Offer>, timeout: u64 },

    /// The current player must pick one of these offers.
    SelectOfferChoices { offers: Vec<Offer>, timeout: u64 },

    /// The current player picked the offer of `player_id`.
    SelectOfferChosen { timeout: u64, player_id: PlayerId },

    // -- Turn and round transitions --
    PrepareForNextTurn { timeout: u64, next_bidder: PlayerId },

    EndOfRound { timeout: u64 },

    /// Points each hand earned this round.
    UpdateScore { timeout: u64, scores: Vec<ScoreLine> },

    /// Cumulative totals before and after this round.
    SumScore { timeout: u64, scores: Vec<SumLine> },
}

impl ServerEvent {
    /// The wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::SetNameResponse { .. } => "set_name_response",
            ServerEvent::PlayerJoined { .. } => "player_joined",
            ServerEvent::Error { .. } => "error",
            ServerEvent::DealingCards {} => "dealing_cards",
            ServerEvent::CardsDealt { .. } => "cards_dealt",
            ServerEvent::CardsUpdate { .. } => "cards_update",
            ServerEvent::ChooseBid { .. } => "choose_bid",
            ServerEvent::ShowBackOfCardBid { .. } => "show_back_of_card_bid",
            ServerEvent::BidSelected { .. } => "bid_selected",
            ServerEvent::ChooseOffer { .. } => "choose_Offer",
            ServerEvent::MadeOffer { .. } => "made_offer",
            ServerEvent::OfferSelected { .. } => "Offer_selected",
            ServerEvent::OffersFinished { .. } => "offers_finished",
            ServerEvent::SelectOfferChoices { .. } => "select_offer_choices",
            ServerEvent::SelectOfferChosen { .. } => "select_offer_chosen",
            ServerEvent::PrepareForNextTurn { .. } => "prepare_for_next_turn",
            ServerEvent::EndOfRound { .. } => "end_of_round",
            ServerEvent::UpdateScore { .. } => "update_score",
            ServerEvent::SumScore { .. } => "sum_score",
        }
    }
}

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "event_data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Register as a player under `name`.
    SetNameRequest { name: String },

    /// The current player's bid. `is_round_over` asks to end the round after
    /// this turn.
    BidSelected { card: Card, is_round_over: bool },

    /// A non-current player's offer.
    #[serde(rename = "Offer_selected")]
    OfferSelected { card: Card },

    /// The current player picks the offer made by `player_id`.
    PlayerChooseOffer { player_id: PlayerId },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SetNameRequest { .. } => "set_name_request",
            ClientEvent::BidSelected { .. } => "bid_selected",
            ClientEvent::OfferSelected { .. } => "Offer_selected",
            ClientEvent::PlayerChooseOffer { .. } => "player_choose_offer",
        }
    }
}

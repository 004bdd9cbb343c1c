//! The round/turn orchestrator.
//!
//! One orchestrator runs per game, as its own task, and is the only writer
//! of round state. It runs phases strictly one after another:
//!
//! ```text
//! deal → [ bid → reveal → offers → selection → settlement → advance ]* → round end → deal …
//! ```
//!
//! Every wait is bounded. A phase that needs player input opens a decision
//! window, announces the prompt, and takes whatever arrives before the
//! deadline; missing input is replaced by a random choice so the table
//! never stalls. Every error is returned to the table actor, which stops
//! the table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tokio::time::Instant;
use tradehand_cards::{PointsTable, SEATS, build_round_deck, can_finish_round, deal, score};
use tradehand_protocol::{Audience, Card, Offer, PlayerId, ScoreLine, ServerEvent, SumLine, TableId};

use crate::decision::{DecisionDesk, DecisionKind};
use crate::{
    BroadcastError, Broadcaster, CardSwap, Decision, Phase, PhaseTimings, Repository, TableConfig,
    TableError,
};

/// How a game ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// Not enough players to deal, or every seated player left.
    AwaitingPlayers,
    /// The round limit was reached.
    Finished,
}

enum BidOutcome {
    Card(Card),
    RoundDone,
}

enum TurnOutcome {
    Continue,
    RoundDone,
    Abandoned,
}

/// The player after `current` in seat order, wrapping around.
///
/// `seated` must be ascending. `current` need not be in it (they may have
/// just left); the next id above it is still the right successor.
pub fn next_seat(seated: &[PlayerId], current: PlayerId) -> Option<PlayerId> {
    seated
        .iter()
        .copied()
        .find(|id| *id > current)
        .or_else(|| seated.first().copied())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) struct Orchestrator<R, B> {
    table_id: TableId,
    repo: Arc<R>,
    broadcaster: Arc<B>,
    desk: Arc<DecisionDesk>,
    phase: Arc<watch::Sender<Phase>>,
    timings: PhaseTimings,
    points: PointsTable,
    rounds_limit: Option<u32>,
    rounds_played: u32,
    rng: ChaCha8Rng,
}

impl<R: Repository, B: Broadcaster> Orchestrator<R, B> {
    pub(crate) fn new(
        table_id: TableId,
        config: &TableConfig,
        repo: Arc<R>,
        broadcaster: Arc<B>,
        desk: Arc<DecisionDesk>,
        phase: Arc<watch::Sender<Phase>>,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            table_id,
            repo,
            broadcaster,
            desk,
            phase,
            timings: config.timings.clone(),
            points: config.points.clone(),
            rounds_limit: config.rounds_limit,
            rounds_played: 0,
            rng,
        }
    }

    /// Plays rounds until the table empties, the round limit is reached,
    /// or something fails.
    pub(crate) async fn run(mut self) -> Result<GameOutcome, TableError> {
        loop {
            let Some(seats) = self.deal_round().await? else {
                self.enter(Phase::AwaitingPlayers);
                return Ok(GameOutcome::AwaitingPlayers);
            };

            loop {
                match self.play_turn(&seats).await? {
                    TurnOutcome::Continue => {}
                    TurnOutcome::RoundDone => break,
                    TurnOutcome::Abandoned => {
                        tracing::info!(table_id = %self.table_id, "every seated player left");
                        self.enter(Phase::AwaitingPlayers);
                        return Ok(GameOutcome::AwaitingPlayers);
                    }
                }
            }

            self.end_round(&seats).await?;
            self.rounds_played += 1;
            if !self.has_next_round() {
                tracing::info!(table_id = %self.table_id, rounds = self.rounds_played, "round limit reached");
                self.enter(Phase::Finished);
                return Ok(GameOutcome::Finished);
            }
        }
    }

    fn has_next_round(&self) -> bool {
        self.rounds_limit
            .is_none_or(|limit| self.rounds_played < limit)
    }

    fn enter(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        debug_assert!(
            previous.can_transition_to(phase),
            "illegal phase transition {previous} -> {phase}"
        );
        tracing::debug!(table_id = %self.table_id, from = %previous, to = %phase, "phase");
    }

    async fn send(&self, audience: Audience, event: ServerEvent) -> Result<(), BroadcastError> {
        tracing::debug!(table_id = %self.table_id, event = event.name(), ?audience, "broadcast");
        self.broadcaster.broadcast(audience, &event).await
    }

    fn pick(&mut self, player: PlayerId, hand: &[Card]) -> Result<Card, TableError> {
        hand.choose(&mut self.rng)
            .copied()
            .ok_or(TableError::EmptyHand(player))
    }

    /// Seated players that are still connected, in seat order.
    async fn seated_active(&self, seats: &[PlayerId; SEATS]) -> Result<Vec<PlayerId>, TableError> {
        let active = self.repo.active_player_ids().await?;
        Ok(seats
            .iter()
            .copied()
            .filter(|id| active.contains(id))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Dealing
    // -----------------------------------------------------------------------

    async fn deal_round(&mut self) -> Result<Option<[PlayerId; SEATS]>, TableError> {
        self.enter(Phase::Dealing);
        let ids = self.repo.active_player_ids().await?;
        let Ok(seats) = <[PlayerId; SEATS]>::try_from(ids) else {
            tracing::info!(table_id = %self.table_id, "need exactly {SEATS} active players to deal");
            return Ok(None);
        };

        self.repo.clear_hands().await?;
        self.send(Audience::All, ServerEvent::DealingCards {}).await?;

        let deck = build_round_deck(&mut self.rng);
        for (player, cards) in deal(&seats, deck) {
            self.repo.set_hand(player, cards.clone()).await?;
            self.send(Audience::Player(player), ServerEvent::CardsDealt { cards })
                .await?;
        }

        let starter = seats[self.rng.random_range(0..SEATS)];
        self.repo.set_current_player(starter).await?;
        tracing::info!(
            table_id = %self.table_id,
            round = self.rounds_played + 1,
            %starter,
            "round dealt"
        );
        Ok(Some(seats))
    }

    // -----------------------------------------------------------------------
    // One turn
    // -----------------------------------------------------------------------

    async fn play_turn(&mut self, seats: &[PlayerId; SEATS]) -> Result<TurnOutcome, TableError> {
        let current = self.repo.current_player().await?;

        let bid = match self.bid(current).await? {
            BidOutcome::Card(card) => card,
            BidOutcome::RoundDone => return Ok(TurnOutcome::RoundDone),
        };
        self.reveal_bid(current, bid).await?;

        let offers = self.collect_offers(current, seats).await?;
        if let Some(chosen) = self.select_offer(current, &offers).await? {
            self.settle(current, bid, chosen).await?;
        }

        match self.advance(current, seats).await? {
            Some(_) => Ok(TurnOutcome::Continue),
            None => Ok(TurnOutcome::Abandoned),
        }
    }

    async fn bid(&mut self, current: PlayerId) -> Result<BidOutcome, TableError> {
        self.enter(Phase::Bidding);
        let hand = self.repo.hand(current).await?;
        let can_finish = can_finish_round(&hand)?;
        let fallback = self.pick(current, &hand)?;

        let timeout = self.timings.choose_bid;
        let mut window = self.desk.open(DecisionKind::Bid, vec![current]);
        let deadline = Instant::now() + timeout;
        self.send(
            Audience::PlayerAndHub(current),
            ServerEvent::ChooseBid {
                player_id: current,
                timeout: millis(timeout),
                can_finish_round: can_finish,
            },
        )
        .await?;

        while let Some(decision) = window.recv_until(deadline).await {
            let Decision::Bid {
                card, round_done, ..
            } = decision
            else {
                continue;
            };
            if round_done {
                tracing::info!(table_id = %self.table_id, %current, "player ended the round");
                return Ok(BidOutcome::RoundDone);
            }
            if !hand.contains(&card) {
                tracing::warn!(table_id = %self.table_id, %current, %card, "bid card not in hand, ignoring");
                continue;
            }
            return Ok(BidOutcome::Card(card));
        }

        tracing::debug!(table_id = %self.table_id, %current, card = %fallback, "bid timed out");
        Ok(BidOutcome::Card(fallback))
    }

    async fn reveal_bid(&self, current: PlayerId, bid: Card) -> Result<(), TableError> {
        self.enter(Phase::RevealBid);
        let pause = self.timings.show_bid;

        self.send(
            Audience::Hub,
            ServerEvent::ShowBackOfCardBid {
                timeout: millis(pause),
            },
        )
        .await?;
        tokio::time::sleep(pause).await;

        self.send(
            Audience::PlayerAndHub(current),
            ServerEvent::BidSelected {
                card: bid,
                timeout: millis(pause),
            },
        )
        .await?;
        tokio::time::sleep(pause).await;
        Ok(())
    }

    async fn collect_offers(
        &mut self,
        current: PlayerId,
        seats: &[PlayerId; SEATS],
    ) -> Result<Vec<Offer>, TableError> {
        self.enter(Phase::OfferCollection);
        let eligible: Vec<PlayerId> = self
            .seated_active(seats)
            .await?
            .into_iter()
            .filter(|id| *id != current)
            .collect();
        if eligible.is_empty() {
            tracing::info!(table_id = %self.table_id, "nobody left to make an offer");
            return Ok(Vec::new());
        }

        let mut hands = HashMap::with_capacity(eligible.len());
        let mut offers = BTreeMap::new();
        for &player in &eligible {
            let hand = self.repo.hand(player).await?;
            offers.insert(player, self.pick(player, &hand)?);
            hands.insert(player, hand);
        }

        let timeout = self.timings.choose_offer;
        let mut window = self.desk.open(DecisionKind::Offer, eligible.clone());
        let deadline = Instant::now() + timeout;
        self.send(
            Audience::PlayersAndHub(eligible.clone()),
            ServerEvent::ChooseOffer {
                player_ids: eligible.clone(),
                timeout: millis(timeout),
            },
        )
        .await?;

        let mut offered: Vec<PlayerId> = Vec::with_capacity(eligible.len());
        while offered.len() < eligible.len() {
            let Some(decision) = window.recv_until(deadline).await else {
                tracing::debug!(table_id = %self.table_id, "offer collection timed out");
                break;
            };
            let Decision::Offer { player, card } = decision else {
                continue;
            };
            if !hands.get(&player).is_some_and(|hand| hand.contains(&card)) {
                tracing::warn!(table_id = %self.table_id, %player, %card, "offered card not in hand, ignoring");
                continue;
            }

            offers.insert(player, card);
            if !offered.contains(&player) {
                offered.push(player);
            }
            self.send(Audience::Player(player), ServerEvent::OfferSelected { card })
                .await?;
            self.send(
                Audience::Hub,
                ServerEvent::MadeOffer {
                    player_ids: offered.clone(),
                },
            )
            .await?;
        }
        drop(window);

        for (&player, &card) in &offers {
            if !offered.contains(&player) {
                self.send(Audience::Player(player), ServerEvent::OfferSelected { card })
                    .await?;
            }
        }

        let offers: Vec<Offer> = offers
            .into_iter()
            .map(|(player_id, card)| Offer { player_id, card })
            .collect();

        self.send(
            Audience::Hub,
            ServerEvent::MadeOffer {
                player_ids: eligible,
            },
        )
        .await?;
        tokio::time::sleep(self.timings.between_actions).await;

        let pause = self.timings.offers_finished;
        self.send(
            Audience::PlayerAndHub(current),
            ServerEvent::OffersFinished {
                offers: offers.clone(),
                timeout: millis(pause),
            },
        )
        .await?;
        tokio::time::sleep(pause).await;

        Ok(offers)
    }

    async fn select_offer(
        &mut self,
        current: PlayerId,
        offers: &[Offer],
    ) -> Result<Option<Offer>, TableError> {
        let Some(&fallback) = offers.choose(&mut self.rng) else {
            return Ok(None);
        };
        self.enter(Phase::OfferSelection);

        let timeout = self.timings.select_offer;
        let mut window = self.desk.open(DecisionKind::SelectOffer, vec![current]);
        let deadline = Instant::now() + timeout;
        self.send(
            Audience::PlayerAndHub(current),
            ServerEvent::SelectOfferChoices {
                offers: offers.to_vec(),
                timeout: millis(timeout),
            },
        )
        .await?;

        while let Some(decision) = window.recv_until(deadline).await {
            let Decision::SelectOffer { offerer, .. } = decision else {
                continue;
            };
            match offers.iter().find(|offer| offer.player_id == offerer) {
                Some(offer) => return Ok(Some(*offer)),
                None => {
                    tracing::warn!(table_id = %self.table_id, %offerer, "selected player made no offer, ignoring");
                }
            }
        }

        tracing::debug!(table_id = %self.table_id, %current, offerer = %fallback.player_id, "selection timed out");
        Ok(Some(fallback))
    }

    async fn settle(&self, current: PlayerId, bid: Card, chosen: Offer) -> Result<(), TableError> {
        self.enter(Phase::Settlement);
        let (current_hand, offerer_hand) = self
            .repo
            .swap_cards(CardSwap {
                current,
                bid,
                offerer: chosen.player_id,
                offered: chosen.card,
            })
            .await?;
        tracing::debug!(
            table_id = %self.table_id,
            %current,
            offerer = %chosen.player_id,
            %bid,
            offered = %chosen.card,
            "cards swapped"
        );

        let pause = self.timings.show_selected_offer;
        let to_current = ServerEvent::CardsUpdate {
            cards: current_hand,
        };
        let to_offerer = ServerEvent::CardsUpdate {
            cards: offerer_hand,
        };
        let to_hub = ServerEvent::SelectOfferChosen {
            timeout: millis(pause),
            player_id: chosen.player_id,
        };

        tokio::try_join!(
            self.broadcaster
                .broadcast(Audience::Player(current), &to_current),
            self.broadcaster
                .broadcast(Audience::Player(chosen.player_id), &to_offerer),
            async {
                self.broadcaster.broadcast(Audience::Hub, &to_hub).await?;
                tokio::time::sleep(pause).await;
                Ok::<(), BroadcastError>(())
            },
        )?;
        Ok(())
    }

    async fn advance(
        &self,
        current: PlayerId,
        seats: &[PlayerId; SEATS],
    ) -> Result<Option<PlayerId>, TableError> {
        self.enter(Phase::TurnAdvance);
        let seated = self.seated_active(seats).await?;
        let Some(next) = next_seat(&seated, current) else {
            return Ok(None);
        };
        self.repo.set_current_player(next).await?;

        let pause = self.timings.prepare_for_next_turn;
        self.send(
            Audience::PlayerAndHub(next),
            ServerEvent::PrepareForNextTurn {
                timeout: millis(pause),
                next_bidder: next,
            },
        )
        .await?;
        tokio::time::sleep(pause).await;
        Ok(Some(next))
    }

    // -----------------------------------------------------------------------
    // Round end
    // -----------------------------------------------------------------------

    async fn end_round(&mut self, seats: &[PlayerId; SEATS]) -> Result<(), TableError> {
        self.enter(Phase::RoundEnd);
        let totals: HashMap<PlayerId, i64> =
            self.repo.cumulative_scores().await?.into_iter().collect();

        let players = self.seated_active(seats).await?;
        let mut round_scores = Vec::with_capacity(players.len());
        let mut sums = Vec::with_capacity(players.len());
        for player_id in players {
            let cards = self.repo.hand(player_id).await?;
            let points = score(&cards, &self.points)?;
            let old_score = totals.get(&player_id).copied().unwrap_or_default();
            let new_score = self.repo.add_round_points(player_id, points).await?;
            round_scores.push(ScoreLine {
                player_id,
                points,
                cards,
            });
            sums.push(SumLine {
                player_id,
                old_score,
                new_score,
            });
        }
        tracing::info!(table_id = %self.table_id, round = self.rounds_played + 1, "round over");

        let pause = self.timings.end_of_round;
        self.send(
            Audience::Hub,
            ServerEvent::EndOfRound {
                timeout: millis(pause),
            },
        )
        .await?;
        tokio::time::sleep(pause).await;

        let pause = self.timings.update_score;
        self.send(
            Audience::Hub,
            ServerEvent::UpdateScore {
                timeout: millis(pause),
                scores: round_scores,
            },
        )
        .await?;
        tokio::time::sleep(pause).await;

        let pause = self.timings.sum_score;
        self.send(
            Audience::Hub,
            ServerEvent::SumScore {
                timeout: millis(pause),
                scores: sums,
            },
        )
        .await?;
        tokio::time::sleep(pause).await;
        Ok(())
    }
}

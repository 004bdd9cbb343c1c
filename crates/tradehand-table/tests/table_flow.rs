//! Integration tests driving a whole table with a recording broadcaster.
//!
//! Time is paused: every deadline and pacing delay auto-advances as soon as
//! the test and the table are both idle, so a full round of timeouts runs
//! instantly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tradehand_cards::{PointsTable, can_finish_round, score};
use tradehand_protocol::{Audience, Card, PlayerId, ServerEvent};
use tradehand_table::{
    BroadcastError, Broadcaster, Decision, DecisionKind, DecisionRejected, MemoryRepository, Phase,
    Repository, RepositoryError, TableConfig, TableError, TableHandle, TableStatus, next_seat,
    spawn_table,
};

// =========================================================================
// Harness
// =========================================================================

type Events = mpsc::UnboundedReceiver<(Audience, ServerEvent)>;
type Hands = HashMap<PlayerId, Vec<Card>>;

struct Recorder(mpsc::UnboundedSender<(Audience, ServerEvent)>);

impl Broadcaster for Recorder {
    async fn broadcast(&self, audience: Audience, event: &ServerEvent) -> Result<(), BroadcastError> {
        self.0
            .send((audience, event.clone()))
            .map_err(|_| BroadcastError::Closed)
    }
}

struct Broken;

impl Broadcaster for Broken {
    async fn broadcast(&self, _: Audience, _: &ServerEvent) -> Result<(), BroadcastError> {
        Err(BroadcastError::Closed)
    }
}

fn start_table(config: TableConfig) -> (TableHandle, Arc<MemoryRepository>, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    let repo = Arc::new(MemoryRepository::new(config.max_players));
    let table = spawn_table(config, Arc::clone(&repo), Arc::new(Recorder(tx)));
    (table, repo, rx)
}

fn seeded() -> TableConfig {
    TableConfig {
        seed: Some(42),
        ..TableConfig::default()
    }
}

/// Registers and seats four players, returning their ids in seat order.
async fn seat_four(table: &TableHandle) -> Vec<PlayerId> {
    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let id = table.register(name).await.expect("register");
        table.take_seat(id).await.expect("take seat");
        ids.push(id);
    }
    ids
}

/// Skips ahead to the next event with the given wire name.
async fn next_event(events: &mut Events, name: &str) -> (Audience, ServerEvent) {
    loop {
        let (audience, event) = events.recv().await.expect("table stopped broadcasting");
        if event.name() == name {
            return (audience, event);
        }
    }
}

/// Waits for a deal and returns every private hand.
async fn dealt_hands(events: &mut Events) -> Hands {
    next_event(events, "dealing_cards").await;
    let mut hands = HashMap::new();
    while hands.len() < 4 {
        let (audience, event) = next_event(events, "cards_dealt").await;
        let (Audience::Player(id), ServerEvent::CardsDealt { cards }) = (audience, event) else {
            panic!("cards_dealt must go to exactly one player");
        };
        hands.insert(id, cards);
    }
    hands
}

/// Submits until the window has taken the player's previous decision.
async fn submit_when_free(table: &TableHandle, decision: Decision) -> u64 {
    loop {
        match table.submit(decision.clone()) {
            Ok(generation) => return generation,
            Err(DecisionRejected::Pending(_)) => tokio::task::yield_now().await,
            Err(e) => panic!("decision rejected: {e}"),
        }
    }
}

/// A card the player does not hold.
fn foreign_card(hands: &Hands, player: PlayerId) -> Card {
    let (_, hand) = hands.iter().find(|(id, _)| **id != player).unwrap();
    hand[0]
}

async fn current_bidder(events: &mut Events) -> PlayerId {
    match next_event(events, "choose_bid").await {
        (_, ServerEvent::ChooseBid { player_id, .. }) => player_id,
        _ => unreachable!(),
    }
}

// =========================================================================
// Dealing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_fourth_seat_deals_private_disjoint_hands() {
    let (table, repo, mut events) = start_table(seeded());

    let mut ids = Vec::new();
    for (i, name) in ["A", "B", "C", "D"].into_iter().enumerate() {
        let id = table.register(name).await.unwrap();
        assert_eq!(table.take_seat(id).await.unwrap(), i == 3, "only the fourth seat starts");
        ids.push(id);
    }

    let (audience, _) = next_event(&mut events, "dealing_cards").await;
    assert_eq!(audience, Audience::All);

    let mut hands = HashMap::new();
    for _ in 0..4 {
        let (audience, event) = events.recv().await.unwrap();
        let (Audience::Player(id), ServerEvent::CardsDealt { cards }) = (audience, event) else {
            panic!("expected a private cards_dealt");
        };
        hands.insert(id, cards);
    }
    let mut seen = HashSet::new();
    for id in &ids {
        let hand = &hands[id];
        assert_eq!(hand.len(), 5);
        for card in hand {
            assert!(seen.insert(*card), "{card} dealt twice");
        }
        assert_eq!(&repo.hand(*id).await.unwrap(), hand);
    }
    assert_eq!(seen.len(), 20);

    let (audience, event) = next_event(&mut events, "choose_bid").await;
    let ServerEvent::ChooseBid {
        player_id,
        timeout,
        can_finish_round: flag,
    } = event
    else {
        unreachable!()
    };
    assert!(ids.contains(&player_id));
    assert_eq!(audience, Audience::PlayerAndHub(player_id));
    assert_eq!(timeout, 15_000);
    assert_eq!(flag, can_finish_round(&hands[&player_id]).unwrap());
    assert_eq!(repo.current_player().await.unwrap(), player_id);

    let info = table.info().await.unwrap();
    assert_eq!(info.status, TableStatus::Playing);
    assert_eq!(info.active_players, 4);
}

#[tokio::test(start_paused = true)]
async fn test_table_no_deal_until_four_active_players() {
    let (table, _repo, _events) = start_table(seeded());

    let a = table.register("A").await.unwrap();
    table.take_seat(a).await.unwrap();
    for name in ["B", "C"] {
        let id = table.register(name).await.unwrap();
        assert!(!table.take_seat(id).await.unwrap());
    }
    table.leave(a).await.unwrap();

    let d = table.register("D").await.unwrap();
    assert!(!table.take_seat(d).await.unwrap(), "A left, only three active");

    let e = table.register("E").await.unwrap();
    assert!(table.take_seat(e).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_table_fifth_registration_refused() {
    let (table, _repo, _events) = start_table(seeded());
    seat_four(&table).await;

    let result = table.register("E").await;
    assert!(matches!(
        result,
        Err(TableError::Repository(RepositoryError::CapacityExceeded { max: 4 }))
    ));
}

// =========================================================================
// Bidding
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_bid_timeout_reveals_card_from_hand() {
    let (table, _repo, mut events) = start_table(seeded());
    seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;

    let (audience, _) = next_event(&mut events, "show_back_of_card_bid").await;
    assert_eq!(audience, Audience::Hub);

    let (audience, event) = next_event(&mut events, "bid_selected").await;
    let ServerEvent::BidSelected { card, timeout } = event else {
        unreachable!()
    };
    assert_eq!(audience, Audience::PlayerAndHub(current));
    assert_eq!(timeout, 1500);
    assert!(hands[&current].contains(&card));
}

#[tokio::test(start_paused = true)]
async fn test_table_bid_window_rejects_wrong_player_and_kind() {
    let (table, _repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;
    let other = *ids.iter().find(|id| **id != current).unwrap();

    let result = table.submit(Decision::Bid {
        player: other,
        card: hands[&other][0],
        round_done: false,
    });
    assert_eq!(result, Err(DecisionRejected::NotEligible(other)));

    let result = table.submit(Decision::Offer {
        player: other,
        card: hands[&other][0],
    });
    assert_eq!(
        result,
        Err(DecisionRejected::WrongKind {
            expected: DecisionKind::Bid,
            got: DecisionKind::Offer,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_table_bid_card_not_in_hand_ignored() {
    let (table, _repo, mut events) = start_table(seeded());
    seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;
    let start = Instant::now();

    let stolen = foreign_card(&hands, current);
    table
        .submit(Decision::Bid {
            player: current,
            card: stolen,
            round_done: false,
        })
        .unwrap();

    // The window keeps waiting, so a valid bid still counts.
    let own = hands[&current][3];
    submit_when_free(
        &table,
        Decision::Bid {
            player: current,
            card: own,
            round_done: false,
        },
    )
    .await;

    let (_, event) = next_event(&mut events, "bid_selected").await;
    assert!(matches!(event, ServerEvent::BidSelected { card, .. } if card == own));
    assert!(start.elapsed() < Duration::from_secs(15));
}

// =========================================================================
// A full turn with explicit decisions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_explicit_turn_swaps_bid_for_chosen_offer() {
    let (table, repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;

    let bid = hands[&current][0];
    table
        .submit(Decision::Bid {
            player: current,
            card: bid,
            round_done: false,
        })
        .unwrap();
    let (_, event) = next_event(&mut events, "bid_selected").await;
    assert!(matches!(event, ServerEvent::BidSelected { card, .. } if card == bid));

    // Offers from everyone else.
    let (audience, event) = next_event(&mut events, "choose_Offer").await;
    let ServerEvent::ChooseOffer { player_ids, .. } = event else {
        unreachable!()
    };
    let eligible: Vec<PlayerId> = ids.iter().copied().filter(|id| *id != current).collect();
    assert_eq!(player_ids, eligible);
    assert_eq!(audience, Audience::PlayersAndHub(eligible.clone()));

    for player in &eligible {
        table
            .submit(Decision::Offer {
                player: *player,
                card: hands[player][1],
            })
            .unwrap();
    }
    for (n, player) in eligible.iter().enumerate() {
        let (audience, event) = events.recv().await.unwrap();
        assert_eq!(audience, Audience::Player(*player));
        assert_eq!(
            event,
            ServerEvent::OfferSelected {
                card: hands[player][1]
            }
        );
        let (audience, event) = events.recv().await.unwrap();
        assert_eq!(audience, Audience::Hub);
        assert_eq!(
            event,
            ServerEvent::MadeOffer {
                player_ids: eligible[..=n].to_vec()
            }
        );
    }

    let (_, event) = next_event(&mut events, "offers_finished").await;
    let ServerEvent::OffersFinished { offers, .. } = event else {
        unreachable!()
    };
    let offered: Vec<(PlayerId, Card)> = offers.iter().map(|o| (o.player_id, o.card)).collect();
    let expected: Vec<(PlayerId, Card)> = eligible.iter().map(|p| (*p, hands[p][1])).collect();
    assert_eq!(offered, expected);

    // The current player picks the second offer.
    let (audience, _) = next_event(&mut events, "select_offer_choices").await;
    assert_eq!(audience, Audience::PlayerAndHub(current));
    let offerer = eligible[1];
    let offered_card = hands[&offerer][1];
    table
        .submit(Decision::SelectOffer {
            player: current,
            offerer,
        })
        .unwrap();

    let mut updates = HashMap::new();
    let mut chosen = None;
    for _ in 0..3 {
        match events.recv().await.unwrap() {
            (Audience::Player(id), ServerEvent::CardsUpdate { cards }) => {
                updates.insert(id, cards);
            }
            (Audience::Hub, ServerEvent::SelectOfferChosen { player_id, .. }) => {
                chosen = Some(player_id);
            }
            other => panic!("unexpected settlement event {other:?}"),
        }
    }
    assert_eq!(chosen, Some(offerer));

    let current_hand = &updates[&current];
    let offerer_hand = &updates[&offerer];
    assert_eq!(current_hand.len(), 5);
    assert_eq!(offerer_hand.len(), 5);
    assert!(current_hand.contains(&offered_card) && !current_hand.contains(&bid));
    assert!(offerer_hand.contains(&bid) && !offerer_hand.contains(&offered_card));
    assert_eq!(&repo.hand(current).await.unwrap(), current_hand);
    assert_eq!(&repo.hand(offerer).await.unwrap(), offerer_hand);

    let (audience, event) = next_event(&mut events, "prepare_for_next_turn").await;
    let expected_next = next_seat(&ids, current).unwrap();
    assert_eq!(audience, Audience::PlayerAndHub(expected_next));
    assert!(matches!(
        event,
        ServerEvent::PrepareForNextTurn { next_bidder, timeout: 2000 } if next_bidder == expected_next
    ));
}

#[tokio::test(start_paused = true)]
async fn test_table_offer_timeout_echoes_fallback_once_per_silent_player() {
    let (table, _repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;
    let eligible: Vec<PlayerId> = ids.iter().copied().filter(|id| *id != current).collect();

    next_event(&mut events, "choose_Offer").await;
    let eager = eligible[0];
    table
        .submit(Decision::Offer {
            player: eager,
            card: hands[&eager][2],
        })
        .unwrap();

    let mut echoes: HashMap<PlayerId, Vec<Card>> = HashMap::new();
    loop {
        match events.recv().await.unwrap() {
            (Audience::Player(id), ServerEvent::OfferSelected { card }) => {
                echoes.entry(id).or_default().push(card);
            }
            (_, ServerEvent::OffersFinished { .. }) => break,
            _ => {}
        }
    }

    assert_eq!(echoes[&eager], vec![hands[&eager][2]]);
    for player in &eligible[1..] {
        assert_eq!(echoes[player].len(), 1, "{player} echoed once");
        assert!(hands[player].contains(&echoes[player][0]));
    }
}

#[tokio::test(start_paused = true)]
async fn test_table_repeated_offers_leave_room_for_other_players() {
    let (table, _repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;
    let eligible: Vec<PlayerId> = ids.iter().copied().filter(|id| *id != current).collect();
    next_event(&mut events, "choose_Offer").await;

    let (eager, patient) = (eligible[0], eligible[1]);
    for card in &hands[&eager][..3] {
        let _ = table.submit(Decision::Offer {
            player: eager,
            card: *card,
        });
    }
    let chosen = hands[&patient][4];
    submit_when_free(
        &table,
        Decision::Offer {
            player: patient,
            card: chosen,
        },
    )
    .await;

    let (_, event) = next_event(&mut events, "offers_finished").await;
    let ServerEvent::OffersFinished { offers, .. } = event else {
        unreachable!()
    };
    let offer = offers.iter().find(|o| o.player_id == patient).unwrap();
    assert_eq!(offer.card, chosen);
}

#[tokio::test(start_paused = true)]
async fn test_table_offer_card_not_in_hand_dropped() {
    let (table, _repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    let hands = dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;
    let offerer = *ids.iter().find(|id| **id != current).unwrap();
    next_event(&mut events, "choose_Offer").await;

    let stolen = foreign_card(&hands, offerer);
    table
        .submit(Decision::Offer {
            player: offerer,
            card: stolen,
        })
        .unwrap();

    let mut echoes = Vec::new();
    let offers = loop {
        match events.recv().await.unwrap() {
            (Audience::Player(id), ServerEvent::OfferSelected { card }) if id == offerer => {
                echoes.push(card);
            }
            (Audience::Hub, ServerEvent::MadeOffer { player_ids }) if player_ids.len() < 3 => {
                panic!("a dropped offer was announced: {player_ids:?}");
            }
            (_, ServerEvent::OffersFinished { offers, .. }) => break offers,
            _ => {}
        }
    };

    // Only the fallback is echoed, and it comes from the offerer's hand.
    assert_eq!(echoes.len(), 1);
    assert_ne!(echoes[0], stolen);
    assert!(hands[&offerer].contains(&echoes[0]));
    let offer = offers.iter().find(|o| o.player_id == offerer).unwrap();
    assert_eq!(offer.card, echoes[0]);
}

#[tokio::test(start_paused = true)]
async fn test_table_selecting_player_without_offer_takes_fallback_at_deadline() {
    let (table, _repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;
    let eligible: Vec<PlayerId> = ids.iter().copied().filter(|id| *id != current).collect();

    next_event(&mut events, "select_offer_choices").await;
    let opened = Instant::now();
    table
        .submit(Decision::SelectOffer {
            player: current,
            offerer: current,
        })
        .unwrap();

    let (_, event) = next_event(&mut events, "select_offer_chosen").await;
    let ServerEvent::SelectOfferChosen { player_id, .. } = event else {
        unreachable!()
    };
    assert!(eligible.contains(&player_id));
    assert!(opened.elapsed() >= Duration::from_secs(15));
}

// =========================================================================
// Turn order
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_turns_cycle_in_seat_order() {
    let (table, repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    dealt_hands(&mut events).await;

    let first = current_bidder(&mut events).await;
    let start = ids.iter().position(|id| *id == first).unwrap();

    for n in 1..=6 {
        let (_, event) = next_event(&mut events, "prepare_for_next_turn").await;
        let ServerEvent::PrepareForNextTurn { next_bidder, .. } = event else {
            unreachable!()
        };
        assert_eq!(next_bidder, ids[(start + n) % 4]);
        assert_eq!(repo.current_player().await.unwrap(), next_bidder);
    }
}

// =========================================================================
// Players leaving mid-round
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_departed_player_skipped_then_table_reopens() {
    let (table, _repo, mut events) = start_table(seeded());
    let ids = seat_four(&table).await;
    dealt_hands(&mut events).await;
    let current = current_bidder(&mut events).await;

    let gone = next_seat(&ids, current).unwrap();
    table.leave(gone).await.unwrap();
    assert_eq!(table.status(), TableStatus::Playing);

    let (_, event) = next_event(&mut events, "choose_Offer").await;
    let ServerEvent::ChooseOffer { player_ids, .. } = event else {
        unreachable!()
    };
    let staying: Vec<PlayerId> = ids
        .iter()
        .copied()
        .filter(|id| *id != current && *id != gone)
        .collect();
    assert_eq!(player_ids, staying);

    let (_, event) = next_event(&mut events, "prepare_for_next_turn").await;
    let ServerEvent::PrepareForNextTurn { next_bidder, .. } = event else {
        unreachable!()
    };
    assert_eq!(next_bidder, next_seat(&ids, gone).unwrap());

    for id in ids.iter().filter(|id| **id != gone) {
        table.leave(*id).await.unwrap();
    }
    for _ in 0..1000 {
        if table.status() == TableStatus::Open {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(table.status(), TableStatus::Open);
    assert_eq!(table.phase(), Phase::AwaitingPlayers);

    // The same names come back under the same ids and a new game deals.
    for (name, id) in ["A", "B", "C", "D"].into_iter().zip(&ids) {
        assert_eq!(table.register(name).await.unwrap(), *id);
    }
    let mut started = false;
    for id in &ids {
        started |= table.take_seat(*id).await.unwrap();
    }
    assert!(started);
    assert_eq!(dealt_hands(&mut events).await.len(), 4);
}

// =========================================================================
// Round end and scoring
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_round_scores_accumulate_across_rounds() {
    let config = TableConfig {
        rounds_limit: Some(2),
        ..seeded()
    };
    let (table, repo, mut events) = start_table(config);
    seat_four(&table).await;

    let mut totals: HashMap<PlayerId, i64> = HashMap::new();
    for _round in 0..2 {
        let hands = dealt_hands(&mut events).await;
        let current = current_bidder(&mut events).await;
        table
            .submit(Decision::Bid {
                player: current,
                card: hands[&current][0],
                round_done: true,
            })
            .unwrap();

        let (audience, _) = next_event(&mut events, "end_of_round").await;
        assert_eq!(audience, Audience::Hub);

        let (audience, event) = next_event(&mut events, "update_score").await;
        assert_eq!(audience, Audience::Hub);
        let ServerEvent::UpdateScore { scores, timeout } = event else {
            unreachable!()
        };
        assert_eq!(timeout, 5000);
        assert_eq!(scores.len(), 4);
        let mut earned = HashMap::new();
        for line in &scores {
            assert_eq!(line.cards, hands[&line.player_id]);
            assert_eq!(line.points, score(&line.cards, &PointsTable::default()).unwrap());
            earned.insert(line.player_id, line.points);
        }

        let (_, event) = next_event(&mut events, "sum_score").await;
        let ServerEvent::SumScore { scores, .. } = event else {
            unreachable!()
        };
        for line in scores {
            let old = totals.get(&line.player_id).copied().unwrap_or(0);
            assert_eq!(line.old_score, old);
            assert_eq!(line.new_score, old + earned[&line.player_id]);
            totals.insert(line.player_id, line.new_score);
        }
    }

    assert_eq!(table.stopped().await, TableStatus::Finished);
    for (id, total) in repo.cumulative_scores().await.unwrap() {
        assert_eq!(totals[&id], total);
    }
}

// =========================================================================
// Failure policy
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_table_broadcast_failure_stops_table() {
    let repo = Arc::new(MemoryRepository::new(4));
    let table = spawn_table(seeded(), repo, Arc::new(Broken));
    seat_four(&table).await;

    match table.stopped().await {
        TableStatus::Failed(reason) => assert!(reason.contains("closed"), "{reason}"),
        other => panic!("expected a failed table, got {other}"),
    }
    assert!(matches!(
        table.register("late").await,
        Err(TableError::Unavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_table_shutdown_stops_actor() {
    let (table, _repo, _events) = start_table(seeded());
    table.shutdown().await.unwrap();
    assert_eq!(table.stopped().await, TableStatus::Stopped);
}

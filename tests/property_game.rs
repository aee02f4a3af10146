//! Property-based tests for cards, draw orders and status evaluation
//!
//! Uses proptest to check the game invariants across random packs and seeds

use lotoo::{CardStatus, CardTracker, CardType, Context, MemorySource, PackHandle, PackWriter};
use proptest::prelude::*;
use std::collections::HashSet;

fn context_with_pack(count: usize) -> (Context, PackHandle) {
    let mut writer = PackWriter::new();
    for i in 0..count {
        writer
            .add_quiz(&format!("answer{:03}.txt", i), format!("question{:03}", i))
            .unwrap();
    }
    let mut ctx = Context::new();
    let pack = ctx
        .load_pack(MemorySource::new(writer.finish().unwrap()))
        .unwrap();
    (ctx, pack)
}

fn card_type() -> impl Strategy<Value = CardType> {
    prop_oneof![
        Just(CardType::OneLine1x5),
        Just(CardType::USStyle5x5),
        Just(CardType::EUStyle3x9),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_cards_are_deterministic_and_distinct(
        count in 24usize..80,
        card_type in card_type(),
        index in any::<u32>()
    ) {
        let (ctx, pack) = context_with_pack(count);
        let pack = ctx.pack(pack).unwrap();

        let card = pack.card(card_type, index).unwrap();
        prop_assert_eq!(&card, &pack.card(card_type, index).unwrap());

        let names: Vec<&str> = card.names().collect();
        let distinct: HashSet<&str> = names.iter().copied().collect();
        prop_assert_eq!(names.len(), card_type.layout().named_slots());
        prop_assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn prop_draw_order_is_a_permutation(count in 0usize..120, seed in any::<u32>()) {
        let (mut ctx, pack) = context_with_pack(count);
        let game = ctx.start_game(pack, CardType::OneLine1x5, seed).unwrap();
        let game = ctx.game(game).unwrap();

        let mut order = game.draw_order().to_vec();
        order.sort_unstable();
        prop_assert_eq!(order, (0..count as u32).collect::<Vec<_>>());
    }

    #[test]
    fn prop_seed_reproduces_game(count in 1usize..60, seed in any::<u32>()) {
        let (mut ctx, pack) = context_with_pack(count);
        let a = ctx.start_game(pack, CardType::USStyle5x5, seed).unwrap();
        let b = ctx.start_game(pack, CardType::USStyle5x5, seed).unwrap();

        let a = ctx.game(a).unwrap();
        let b = ctx.game(b).unwrap();
        prop_assert_eq!(a.draw_order(), b.draw_order());
        for position in 0..a.quiz_count() {
            prop_assert_eq!(a.quiz(position).unwrap(), b.quiz(position).unwrap());
        }
    }

    #[test]
    fn prop_status_never_drops(
        count in 24usize..60,
        card_type in card_type(),
        seed in any::<u32>(),
        card_index in 0u32..1000
    ) {
        let (mut ctx, pack) = context_with_pack(count);
        let game = ctx.start_game(pack, card_type, seed).unwrap();
        let game = ctx.game(game).unwrap();

        let mut previous = CardStatus::Nothing;
        for position in 0..game.quiz_count() {
            let status = game.check_card_status(position, card_index).unwrap();
            prop_assert!(status.severity() >= previous.severity(),
                "{:?} after {:?} at {}", status, previous, position);
            previous = status;
        }
        // Every name on the card is eventually drawn
        prop_assert_eq!(previous, CardStatus::FullCard);
    }

    #[test]
    fn prop_tracker_matches_direct_check(
        count in 24usize..50,
        card_type in card_type(),
        seed in any::<u32>(),
        card_index in 0u32..1000,
        jumps in prop::collection::vec(0u32..50, 1..12)
    ) {
        let (mut ctx, pack) = context_with_pack(count);
        let game = ctx.start_game(pack, card_type, seed).unwrap();
        let game = ctx.game(game).unwrap();
        let mut tracker = CardTracker::new(game, card_index).unwrap();

        for jump in jumps {
            let position = jump % game.quiz_count();
            let tracked = tracker.advance_to(game, position).unwrap();
            prop_assert_eq!(tracked, game.check_card_status(position, card_index).unwrap());
        }
    }
}

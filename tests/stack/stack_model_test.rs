/*!
 * Stack Model Tests
 * Random operation sequences checked against a Vec
 */

use parpool::LockFreeStack;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Push(u32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    #[test]
    fn prop_matches_vec_model(ops in proptest::collection::vec(op_strategy(), 0..500)) {
        let stack = LockFreeStack::new();
        let mut model = Vec::new();
        let mut high_water = 0;

        for op in ops {
            match op {
                Op::Push(value) => {
                    stack.push(value);
                    model.push(value);
                    high_water = high_water.max(model.len());
                }
                Op::Pop => prop_assert_eq!(stack.pop(), model.pop()),
            }
            prop_assert_eq!(stack.size(), model.len());
        }

        // Node count never exceeds the largest size reached
        prop_assert_eq!(stack.capacity(), high_water);
        prop_assert_eq!(stack.recycled(), high_water - model.len());
    }
}

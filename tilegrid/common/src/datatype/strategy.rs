use proptest::prelude::*;

use crate::datatype::Datatype;

impl Arbitrary for Datatype {
    type Parameters = ();
    type Strategy = BoxedStrategy<Datatype>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        proptest::strategy::Union::new(
            Datatype::iter().map(Just).collect::<Vec<Just<Datatype>>>(),
        )
        .boxed()
    }
}

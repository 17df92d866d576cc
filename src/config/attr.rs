use crate::event::EventDefinition;
use crate::ffi::{bindings as b, Attr};

pub(crate) fn from(def: &EventDefinition) -> Attr {
    let mut attr = Attr {
        size: size_of::<Attr>() as _,
        ..Default::default()
    };

    // event config:

    attr.type_ = b::PERF_TYPE_RAW;
    attr.config = def.raw.config();

    // count config:

    macro_rules! when {
        ($bool:ident, $then:tt) => {
            if def.exclude.$bool {
                attr.$then(1);
            }
        };
    }
    when!(kernel, set_exclude_kernel);
    when!(hv, set_exclude_hv);

    // A single u64 per read, no group or timing fields.
    attr.read_format = 0;
    // Counters are enabled together once the whole matrix is open.
    attr.set_disabled(1);

    attr
}

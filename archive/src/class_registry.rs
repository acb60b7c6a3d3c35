//! Class registry (C1): interns `(module, name)` pairs into small integer class ids,
//! verifying each one against the application's own class resolver before trusting it.

use crate::codec::value::ValueCodec;
use crate::error::{CResult, Error};
use crate::keys;
use crate::model::{ClassDescriptor, ClassResolver, ClassRow};
use crate::storage::engine::Engine;
use crate::txn::Txn;

/// Verifies `descriptor` against `resolver`, then returns its class_id -- an existing
/// one if `(module, name)` was already interned, or a freshly allocated one otherwise.
pub fn intern<E: Engine>(
    txn: &mut Txn<E>,
    resolver: &dyn ClassResolver,
    descriptor: &ClassDescriptor,
) -> CResult<i32> {
    match resolver.resolve(&descriptor.module, &descriptor.name) {
        Some(type_id) if type_id == descriptor.type_id => {}
        _ => {
            return Err(Error::BrokenClassReference {
                module: descriptor.module.clone(),
                name: descriptor.name.clone(),
            })
        }
    }

    let codec = ValueCodec::new();
    let by_name_key = keys::class_by_name(&descriptor.module, &descriptor.name);
    if let Some(bytes) = txn.get(&by_name_key)? {
        return codec.decode(&bytes);
    }

    let class_id = txn.next_id(&keys::next_class_id())? as i32;
    let row = ClassRow { class_id, module: descriptor.module.clone(), name: descriptor.name.clone() };
    txn.set(&keys::class(class_id), codec.encode(&row)?);
    txn.set(&by_name_key, codec.encode(&class_id)?);
    Ok(class_id)
}

/// Looks up an already-interned class row by id, for readers (`history`,
/// `get_version`) that need to report `(module, name)` back to the caller.
pub fn get<E: Engine>(txn: &mut Txn<E>, class_id: i32) -> CResult<ClassRow> {
    let bytes = txn
        .get(&keys::class(class_id))?
        .ok_or_else(|| Error::NotFound(format!("class {class_id}")))?;
    ValueCodec::new().decode(&bytes)
}

//! Instruction data: Borsh-serialized arguments behind the target program's instruction tag.

use borsh::BorshSerialize;

use crate::crypto::instruction_discriminator;
use crate::errors::WorkflowError;

/// Anchor programs dispatch on an 8-byte discriminator of the handler name.
pub fn anchor_data<T: BorshSerialize>(instruction: &str, args: &T) -> Result<Vec<u8>, WorkflowError> {
    let mut data = instruction_discriminator(instruction).to_vec();
    args.serialize(&mut data)
        .map_err(|e| WorkflowError::Instruction(format!("{}: {}", instruction, e)))?;
    Ok(data)
}

/// Native programs such as token metadata dispatch on a 1-byte instruction index.
pub fn indexed_data<T: BorshSerialize>(index: u8, args: &T) -> Result<Vec<u8>, WorkflowError> {
    let mut data = vec![index];
    args.serialize(&mut data)
        .map_err(|e| WorkflowError::Instruction(format!("instruction {}: {}", index, e)))?;
    Ok(data)
}

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod id;
pub mod amount;
pub mod row;

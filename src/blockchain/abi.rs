//! Registry contract ABI.

use alloy::sol;

sol! {
    /// Header registry: read queries and the three state-changing entry points.
    #[derive(Debug)]
    interface IRelay {
        function findHeight(bytes32 digest) external view returns (uint256);
        function isAncestor(bytes32 ancestor, bytes32 descendant, uint256 limit) external view returns (bool);
        function getBestKnownDigest() external view returns (bytes32);

        function addHeaders(bytes anchor, bytes headers) external returns (bool);
        function addHeadersWithRetarget(bytes oldPeriodStartHeader, bytes oldPeriodEndHeader, bytes headers) external returns (bool);
        function markNewHeaviest(bytes32 ancestor, bytes currentBest, bytes newBest, uint256 limit) external returns (bool);
    }
}

//! Collaborator primitives consumed by batch construction.
//!
//! Only the functions a batch encodes or a pre-check reads are declared.

use alloy_sol_types::sol;

sol! {
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    interface IFixedProductMarketMaker {
        function buy(
            uint256 investmentAmount,
            uint256 outcomeIndex,
            uint256 minOutcomeTokensToBuy
        ) external;
        function sell(
            uint256 returnAmount,
            uint256 outcomeIndex,
            uint256 maxOutcomeTokensToSell
        ) external;
        function addFunding(uint256 addedFunds, uint256[] distributionHint) external;
        function removeFunding(uint256 sharesToBurn) external;
        function calcBuyAmount(uint256 investmentAmount, uint256 outcomeIndex)
            external
            view
            returns (uint256);
        function calcSellAmount(uint256 returnAmount, uint256 outcomeIndex)
            external
            view
            returns (uint256);
        function collateralToken() external view returns (address);
        function conditionIds(uint256 index) external view returns (bytes32);
    }

    interface IConditionalTokens {
        function prepareCondition(
            address oracle,
            bytes32 questionId,
            uint256 outcomeSlotCount
        ) external;
        function mergePositions(
            address collateralToken,
            bytes32 parentCollectionId,
            bytes32 conditionId,
            uint256[] partition,
            uint256 amount
        ) external;
        function redeemPositions(
            address collateralToken,
            bytes32 parentCollectionId,
            bytes32 conditionId,
            uint256[] indexSets
        ) external;
        function setApprovalForAll(address operator, bool approved) external;
        function isApprovedForAll(address owner, address operator) external view returns (bool);
        function getOutcomeSlotCount(bytes32 conditionId) external view returns (uint256);
        function payoutDenominator(bytes32 conditionId) external view returns (uint256);
        function getCollectionId(
            bytes32 parentCollectionId,
            bytes32 conditionId,
            uint256 indexSet
        ) external view returns (bytes32);
    }

    interface IMarketMakerFactory {
        function create2FixedProductMarketMaker(
            uint256 saltNonce,
            address conditionalTokens,
            address collateralToken,
            bytes32[] conditionIds,
            uint256 fee,
            uint256 initialFunds,
            uint256[] distributionHint
        ) external returns (address);
    }

    interface IRealitio {
        function askQuestion(
            uint256 template_id,
            string question,
            address arbitrator,
            uint32 timeout,
            uint32 opening_ts,
            uint256 nonce
        ) external payable returns (bytes32);
    }

    interface IRealitioOracle {
        function resolve(
            bytes32 questionId,
            uint256 templateId,
            string question,
            uint256 numOutcomes
        ) external;
    }
}
